//! Typed PDF object model
//!
//! A small value/dictionary model with an explicit serializer, so that
//! operations like "append an /Annots entry" or "point /AcroForm at a new
//! object" are structural edits instead of text patches on serialized
//! dictionaries.

use std::fmt::Write as _;

/// Indirect object reference (`n g R`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub num: u32,
    pub generation: u16,
}

impl ObjectRef {
    pub fn new(num: u32) -> Self {
        Self { num, generation: 0 }
    }
}

/// PDF value
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// Name object, stored without the leading slash
    Name(String),
    /// Literal string `( ... )`, escaped on serialization
    LiteralString(String),
    /// Hex string `< ... >`, stored as raw bytes
    HexString(Vec<u8>),
    Reference(ObjectRef),
    Array(Vec<PdfValue>),
    Dict(PdfDict),
    /// Pre-serialized text emitted verbatim. Used for fixed-width
    /// placeholders whose byte length must survive serialization unchanged.
    Raw(String),
}

impl PdfValue {
    pub fn name(s: &str) -> Self {
        PdfValue::Name(s.to_string())
    }

    pub fn string(s: &str) -> Self {
        PdfValue::LiteralString(s.to_string())
    }

    pub fn reference(num: u32) -> Self {
        PdfValue::Reference(ObjectRef::new(num))
    }

    /// Serialize into the output buffer
    pub fn write_to(&self, out: &mut String) {
        match self {
            PdfValue::Null => out.push_str("null"),
            PdfValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            PdfValue::Integer(i) => {
                let _ = write!(out, "{}", i);
            }
            PdfValue::Real(r) => {
                // Trim trailing zeros the way hand-written PDFs do
                let mut s = format!("{:.4}", r);
                while s.ends_with('0') {
                    s.pop();
                }
                if s.ends_with('.') {
                    s.pop();
                }
                out.push_str(&s);
            }
            PdfValue::Name(n) => {
                out.push('/');
                out.push_str(n);
            }
            PdfValue::LiteralString(s) => {
                out.push('(');
                out.push_str(&escape_pdf_string(s));
                out.push(')');
            }
            PdfValue::HexString(bytes) => {
                out.push('<');
                for b in bytes {
                    let _ = write!(out, "{:02X}", b);
                }
                out.push('>');
            }
            PdfValue::Reference(r) => {
                let _ = write!(out, "{} {} R", r.num, r.generation);
            }
            PdfValue::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    item.write_to(out);
                }
                out.push(']');
            }
            PdfValue::Dict(d) => d.write_to(out),
            PdfValue::Raw(s) => out.push_str(s),
        }
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }
}

/// Dictionary with insertion-ordered keys
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDict {
    entries: Vec<(String, PdfValue)>,
}

impl PdfDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, replacing an existing value in place
    pub fn set(&mut self, key: &str, value: PdfValue) -> &mut Self {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&PdfValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PdfValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<PdfValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a value to the array at `key`, creating the array if needed.
    /// Duplicate references are not appended twice.
    pub fn push_to_array(&mut self, key: &str, value: PdfValue) {
        match self.get_mut(key) {
            Some(PdfValue::Array(items)) => {
                if !items.contains(&value) {
                    items.push(value);
                }
            }
            _ => {
                self.set(key, PdfValue::Array(vec![value]));
            }
        }
    }

    pub fn write_to(&self, out: &mut String) {
        out.push_str("<<");
        for (key, value) in &self.entries {
            out.push(' ');
            out.push('/');
            out.push_str(key);
            out.push(' ');
            value.write_to(out);
        }
        out.push_str(" >>");
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }
}

/// Escape special characters in a PDF literal string
pub fn escape_pdf_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '(' => result.push_str("\\("),
            ')' => result.push_str("\\)"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ => result.push(c),
        }
    }
    result
}

/// One indirect object ready for the incremental writer: number plus a body
/// that is either a serialized dictionary or a full stream object. Bodies
/// are byte buffers because stream payloads are binary.
#[derive(Debug, Clone)]
pub struct IndirectObject {
    pub num: u32,
    pub body: Vec<u8>,
}

impl IndirectObject {
    pub fn from_dict(num: u32, dict: &PdfDict) -> Self {
        Self {
            num,
            body: dict.serialize().into_bytes(),
        }
    }

    /// Stream object: dictionary (with /Length set) + stream payload
    pub fn stream(num: u32, mut dict: PdfDict, payload: &[u8]) -> Self {
        dict.set("Length", PdfValue::Integer(payload.len() as i64));
        let mut body = dict.serialize().into_bytes();
        body.extend_from_slice(b"\nstream\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\nendstream");
        Self { num, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_serialization() {
        assert_eq!(PdfValue::name("Sig").serialize(), "/Sig");
        assert_eq!(PdfValue::Integer(42).serialize(), "42");
        assert_eq!(PdfValue::Real(12.5).serialize(), "12.5");
        assert_eq!(PdfValue::Real(100.0).serialize(), "100");
        assert_eq!(PdfValue::reference(7).serialize(), "7 0 R");
        assert_eq!(PdfValue::Boolean(true).serialize(), "true");
        assert_eq!(PdfValue::HexString(vec![0xDE, 0xAD]).serialize(), "<DEAD>");
    }

    #[test]
    fn test_literal_string_escaping() {
        assert_eq!(
            PdfValue::string("a (b) \\c").serialize(),
            "(a \\(b\\) \\\\c)"
        );
    }

    #[test]
    fn test_array_serialization() {
        let arr = PdfValue::Array(vec![
            PdfValue::Integer(0),
            PdfValue::Integer(0),
            PdfValue::Real(200.0),
            PdfValue::Real(50.0),
        ]);
        assert_eq!(arr.serialize(), "[0 0 200 50]");
    }

    #[test]
    fn test_dict_preserves_insertion_order() {
        let mut d = PdfDict::new();
        d.set("Type", PdfValue::name("Sig"));
        d.set("Filter", PdfValue::name("Adobe.PPKLite"));
        assert_eq!(d.serialize(), "<< /Type /Sig /Filter /Adobe.PPKLite >>");
    }

    #[test]
    fn test_dict_set_replaces_in_place() {
        let mut d = PdfDict::new();
        d.set("A", PdfValue::Integer(1));
        d.set("B", PdfValue::Integer(2));
        d.set("A", PdfValue::Integer(9));
        assert_eq!(d.serialize(), "<< /A 9 /B 2 >>");
    }

    #[test]
    fn test_push_to_array_creates_and_dedups() {
        let mut d = PdfDict::new();
        d.push_to_array("Annots", PdfValue::reference(10));
        d.push_to_array("Annots", PdfValue::reference(11));
        d.push_to_array("Annots", PdfValue::reference(10));
        assert_eq!(d.serialize(), "<< /Annots [10 0 R 11 0 R] >>");
    }

    #[test]
    fn test_raw_preserves_width() {
        let raw = PdfValue::Raw("[0 ********** ********** **********]".into());
        assert_eq!(raw.serialize().len(), 37);
    }

    #[test]
    fn test_stream_object_sets_length() {
        let obj = IndirectObject::stream(5, PdfDict::new(), b"\x01\x02\x03");
        let body = obj.body;
        assert!(body.windows(9).any(|w| w == b"/Length 3"));
        assert!(body.windows(7).any(|w| w == b"stream\n"));
        assert!(body.ends_with(b"endstream"));
        // Binary payload rides through untouched
        assert!(body.windows(3).any(|w| w == [1, 2, 3]));
    }
}
