//! Read-only PDF structure parsing
//!
//! Parses just enough of a loaded PDF to append to it safely: header
//! version, cross-reference table, trailer keys, the page list, and any
//! existing signature fields. Dictionary values are located by direct key
//! search rather than full object-graph parsing; compressed
//! cross-reference streams are handled by an object-scan fallback.

use crate::error::{Result, StructureError};
use crate::object::ObjectRef;
use std::collections::{BTreeMap, BTreeSet};

/// One cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefEntry {
    pub offset: u64,
    pub generation: u16,
    pub free: bool,
}

/// Trailer fields the signing core needs
#[derive(Debug, Clone)]
pub struct Trailer {
    pub size: u32,
    pub root: ObjectRef,
    pub info: Option<ObjectRef>,
    pub id: Option<(Vec<u8>, Vec<u8>)>,
    pub prev: Option<u64>,
}

/// A `/FT /Sig` form field discovered during parsing
#[derive(Debug, Clone)]
pub struct SignatureField {
    pub obj_num: u32,
    pub name: String,
    /// 1-based page number the field's widget is annotated on
    pub page: u32,
    pub rect: [f64; 4],
    /// True iff the field dictionary carries a `/V` reference
    pub signed: bool,
    /// Object number of the signature value dictionary, when signed
    pub value_obj: Option<u32>,
}

/// One page, in document order
#[derive(Debug, Clone, Copy)]
pub struct PageInfo {
    /// 1-based page number
    pub number: u32,
    pub obj_num: u32,
}

/// Immutable structural snapshot of a loaded document. Rebuilt from scratch
/// after every incremental update; never mutated in place.
#[derive(Debug, Clone)]
pub struct StructuralSnapshot {
    pub version: String,
    pub xref: BTreeMap<u32, XrefEntry>,
    pub trailer: Trailer,
    pub pages: Vec<PageInfo>,
    pub signature_fields: Vec<SignatureField>,
    /// Strictly greater than every object number in `xref`
    pub max_object_number: u32,
    /// Byte offset the final `startxref` points at
    pub startxref: u64,
}

impl StructuralSnapshot {
    /// Parse a loaded PDF buffer. All failures are terminal: no partial
    /// snapshot is ever returned.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if !data.starts_with(b"%PDF-") {
            return Err(StructureError::NotAPdf.into());
        }
        let version = read_version(data);

        let startxref = find_startxref(data)?;

        // Classic table, or object-scan fallback for xref streams
        let at_offset = data.get(startxref as usize..).unwrap_or(&[]);
        let (xref, trailer_region_start) = if skip_ws(at_offset).starts_with(b"xref") {
            parse_classic_xref(data, startxref as usize)?
        } else {
            (scan_objects(data), 0)
        };

        if xref.is_empty() {
            return Err(StructureError::MalformedXref("no objects found".into()).into());
        }

        // Trailer keys by direct search. For the classic path, search from
        // the trailer keyword; for the fallback, the last match anywhere in
        // the buffer wins (later incremental updates shadow earlier ones).
        let search_from = trailer_region_start;
        let root = find_last_ref_value(&data[search_from..], b"/Root")
            .ok_or(StructureError::MissingRoot)?;
        let size = find_last_int_value(&data[search_from..], b"/Size")
            .map(|v| v as u32)
            .unwrap_or(xref.keys().max().map(|m| m + 1).unwrap_or(0));
        let info = find_last_ref_value(&data[search_from..], b"/Info");
        let prev = find_last_int_value(&data[search_from..], b"/Prev").map(|v| v as u64);
        let id = find_last_id_value(&data[search_from..]);

        // The Root must resolve to a Catalog
        let catalog = object_slice(data, &xref, root.num).ok_or(StructureError::MissingRoot)?;
        if !contains(catalog, b"/Catalog") {
            return Err(StructureError::MissingRoot.into());
        }

        let pages = parse_pages(data, &xref, catalog);
        let signature_fields = parse_signature_fields(data, &xref, &pages);

        let max_object_number = xref.keys().max().copied().unwrap_or(0);

        Ok(Self {
            version,
            xref,
            trailer: Trailer {
                size,
                root,
                info,
                id,
                prev,
            },
            pages,
            signature_fields,
            max_object_number,
            startxref,
        })
    }

    /// Raw bytes of one object (`n g obj` through `endobj`), when known
    pub fn object_bytes<'a>(&self, data: &'a [u8], num: u32) -> Option<&'a [u8]> {
        object_slice(data, &self.xref, num)
    }

    /// Unsigned signature field with the given name, if any
    pub fn find_unsigned_field(&self, name: &str) -> Option<&SignatureField> {
        self.signature_fields
            .iter()
            .find(|f| f.name == name && !f.signed)
    }
}

fn read_version(data: &[u8]) -> String {
    let rest = &data[5..];
    let end = rest
        .iter()
        .position(|&b| b.is_ascii_whitespace() || b == b'%')
        .unwrap_or(rest.len().min(8));
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

/// Offset named by the last `startxref` token followed by `%%EOF`
fn find_startxref(data: &[u8]) -> Result<u64> {
    let pos = rfind(data, b"startxref").ok_or(StructureError::MissingStartXref)?;
    let tail = &data[pos + b"startxref".len()..];
    if !contains(tail, b"%%EOF") {
        return Err(StructureError::MissingStartXref.into());
    }
    let digits = skip_ws(tail);
    let end = digits
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    std::str::from_utf8(&digits[..end])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| StructureError::MalformedXref("bad startxref offset".into()).into())
}

/// Classic `xref` table: subsection headers followed by fixed 20-byte
/// entries, terminated by the `trailer` keyword. Returns the entry map and
/// the offset of the trailer keyword (where trailer-key search starts).
/// Follows `/Prev` chains so earlier revisions' objects stay resolvable;
/// entries from later sections win.
fn parse_classic_xref(data: &[u8], start: usize) -> Result<(BTreeMap<u32, XrefEntry>, usize)> {
    let mut xref = BTreeMap::new();
    let mut section_start = Some(start);
    let mut first_trailer = None;
    let mut visited = BTreeSet::new();
    // Newest section first; do not overwrite entries already seen
    while let Some(start) = section_start {
        // A /Prev pointing at an already-walked section never terminates
        if !visited.insert(start) {
            return Err(StructureError::MalformedXref("circular /Prev chain".into()).into());
        }
        let trailer_pos = parse_one_xref_section(data, start, &mut xref)?;
        if first_trailer.is_none() {
            first_trailer = Some(trailer_pos);
        }
        let trailer_tail = &data[trailer_pos..];
        let eof = find(trailer_tail, b"%%EOF").unwrap_or(trailer_tail.len());
        section_start = find_int_value(&trailer_tail[..eof], b"/Prev").map(|v| v as usize);
    }
    Ok((xref, first_trailer.unwrap_or(start)))
}

/// Parse one xref section; returns the offset of its `trailer` keyword
fn parse_one_xref_section(
    data: &[u8],
    start: usize,
    xref: &mut BTreeMap<u32, XrefEntry>,
) -> Result<usize> {
    let region = &data[start..];
    let mut cursor = skip_ws(region);
    if !cursor.starts_with(b"xref") {
        return Err(StructureError::MalformedXref("xref keyword missing".into()).into());
    }
    cursor = skip_ws(&cursor[4..]);

    loop {
        if cursor.starts_with(b"trailer") {
            let consumed = region.len() - cursor.len();
            return Ok(start + consumed);
        }
        // Subsection header: "start count"
        let (first, rest) = read_uint(cursor)
            .ok_or_else(|| StructureError::MalformedXref("bad subsection header".into()))?;
        let (count, rest) = read_uint(skip_ws(rest))
            .ok_or_else(|| StructureError::MalformedXref("bad subsection count".into()))?;
        cursor = skip_ws(rest);
        for i in 0..count {
            if cursor.len() < 18 {
                return Err(StructureError::MalformedXref("truncated entry".into()).into());
            }
            let offset: u64 = std::str::from_utf8(&cursor[0..10])
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| StructureError::MalformedXref("bad entry offset".into()))?;
            let generation: u16 = std::str::from_utf8(&cursor[11..16])
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| StructureError::MalformedXref("bad entry generation".into()))?;
            let free = cursor[17] == b'f';
            let num = (first + i) as u32;
            // Do not shadow entries from a newer section
            xref.entry(num).or_insert(XrefEntry {
                offset,
                generation,
                free,
            });
            // Entries are nominally 20 bytes but tolerate 19 (single-byte EOL)
            let mut advance = 18;
            while advance < cursor.len() && (cursor[advance] == b'\r' || cursor[advance] == b'\n' || cursor[advance] == b' ')
            {
                advance += 1;
                if advance >= 20 {
                    break;
                }
            }
            cursor = &cursor[advance..];
        }
        cursor = skip_ws(cursor);
    }
}

/// Fallback for cross-reference streams: scan the whole buffer for
/// `"<n> <g> obj"` headers and treat each as a live object. Deliberately
/// permissive; stale copies from earlier revisions are shadowed because the
/// last occurrence of each object number wins.
pub(crate) fn scan_objects(data: &[u8]) -> BTreeMap<u32, XrefEntry> {
    let mut xref = BTreeMap::new();
    let mut i = 0;
    while let Some(found) = find(&data[i..], b" obj") {
        let obj_pos = i + found;
        // Walk back over "num gen" tokens
        let mut back = obj_pos;
        let mut gen_start = back;
        while gen_start > 0 && data[gen_start - 1].is_ascii_digit() {
            gen_start -= 1;
        }
        if gen_start == back {
            i = obj_pos + 4;
            continue;
        }
        back = gen_start;
        if back == 0 || data[back - 1] != b' ' {
            i = obj_pos + 4;
            continue;
        }
        back -= 1;
        let mut num_start = back;
        while num_start > 0 && data[num_start - 1].is_ascii_digit() {
            num_start -= 1;
        }
        if num_start == back {
            i = obj_pos + 4;
            continue;
        }
        // Token boundary: an object header begins a line (or the file)
        if num_start > 0 && !matches!(data[num_start - 1], b'\n' | b'\r' | b' ') {
            i = obj_pos + 4;
            continue;
        }
        let num: u32 = std::str::from_utf8(&data[num_start..back])
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let generation: u16 = std::str::from_utf8(&data[gen_start..obj_pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        if num > 0 {
            // Last occurrence wins
            xref.insert(
                num,
                XrefEntry {
                    offset: num_start as u64,
                    generation,
                    free: false,
                },
            );
        }
        i = obj_pos + 4;
    }
    xref
}

/// Slice of one object's bytes, from its header through `endobj`
fn object_slice<'a>(data: &'a [u8], xref: &BTreeMap<u32, XrefEntry>, num: u32) -> Option<&'a [u8]> {
    let entry = xref.get(&num)?;
    if entry.free {
        return None;
    }
    let start = entry.offset as usize;
    if start >= data.len() {
        return None;
    }
    let end = find(&data[start..], b"endobj").map(|p| start + p + 6)?;
    Some(&data[start..end])
}

/// Pages from the Catalog's `/Pages` tree, assuming a single flat `/Kids`
/// array (nested page trees are not walked)
fn parse_pages(
    data: &[u8],
    xref: &BTreeMap<u32, XrefEntry>,
    catalog: &[u8],
) -> Vec<PageInfo> {
    let Some(pages_ref) = find_last_ref_value(catalog, b"/Pages") else {
        return Vec::new();
    };
    let Some(pages_obj) = object_slice(data, xref, pages_ref.num) else {
        return Vec::new();
    };
    let Some(kids_pos) = find(pages_obj, b"/Kids") else {
        return Vec::new();
    };
    let after = &pages_obj[kids_pos + 5..];
    let Some(open) = find(after, b"[") else {
        return Vec::new();
    };
    let Some(close) = find(after, b"]") else {
        return Vec::new();
    };
    let array = &after[open + 1..close];
    parse_refs(array)
        .into_iter()
        .enumerate()
        .map(|(i, r)| PageInfo {
            number: (i + 1) as u32,
            obj_num: r.num,
        })
        .collect()
}

/// Scan every known object for `/FT /Sig` dictionaries
fn parse_signature_fields(
    data: &[u8],
    xref: &BTreeMap<u32, XrefEntry>,
    pages: &[PageInfo],
) -> Vec<SignatureField> {
    let mut fields = Vec::new();
    let mut unnamed = 0u32;
    for (&num, entry) in xref {
        if entry.free {
            continue;
        }
        let Some(obj) = object_slice(data, xref, num) else {
            continue;
        };
        if !is_sig_field(obj) {
            continue;
        }
        unnamed += 1;
        let name =
            parse_field_name(obj).unwrap_or_else(|| format!("Signature{}", unnamed));
        let rect = parse_rect(obj).unwrap_or([0.0; 4]);
        let value_obj = find_last_ref_value(obj, b"/V").map(|r| r.num);
        let page = pages
            .iter()
            .find(|p| {
                object_slice(data, xref, p.obj_num)
                    .map(|po| annots_contains(po, num))
                    .unwrap_or(false)
            })
            .map(|p| p.number)
            .unwrap_or(1);
        fields.push(SignatureField {
            obj_num: num,
            name,
            page,
            rect,
            signed: value_obj.is_some(),
            value_obj,
        });
    }
    fields
}

fn is_sig_field(obj: &[u8]) -> bool {
    let Some(ft) = find(obj, b"/FT") else {
        return false;
    };
    let after = skip_ws(&obj[ft + 3..]);
    after.starts_with(b"/Sig")
}

fn annots_contains(page_obj: &[u8], num: u32) -> bool {
    let Some(pos) = find(page_obj, b"/Annots") else {
        return false;
    };
    let after = &page_obj[pos..];
    let end = find(after, b"]").unwrap_or(after.len());
    parse_refs(&after[..end]).iter().any(|r| r.num == num)
}

/// `/T` field name: literal `(...)` or UTF-16BE hex `<...>`
fn parse_field_name(obj: &[u8]) -> Option<String> {
    let mut i = 0;
    while let Some(pos) = find(&obj[i..], b"/T") {
        let at = i + pos;
        // Longer keys sharing the prefix (/Type, /TU) are not /T
        if obj.get(at + 2).is_some_and(|b| b.is_ascii_alphanumeric()) {
            i = at + 2;
            continue;
        }
        return parse_field_name_at(&obj[at..]);
    }
    None
}

fn parse_field_name_at(at: &[u8]) -> Option<String> {
    let after = skip_ws(&at[2..]);
    match after.first()? {
        b'(' => {
            let end = after.iter().position(|&b| b == b')')?;
            Some(String::from_utf8_lossy(&after[1..end]).into_owned())
        }
        b'<' => {
            let end = after.iter().position(|&b| b == b'>')?;
            let hex: Vec<u8> = after[1..end]
                .iter()
                .copied()
                .filter(|b| b.is_ascii_hexdigit())
                .collect();
            let mut bytes = Vec::with_capacity(hex.len() / 2);
            for pair in hex.chunks_exact(2) {
                let s = std::str::from_utf8(pair).ok()?;
                bytes.push(u8::from_str_radix(s, 16).ok()?);
            }
            Some(decode_utf16be(&bytes))
        }
        _ => None,
    }
}

/// UTF-16BE with optional BOM; falls back to latin-1 on odd lengths
fn decode_utf16be(bytes: &[u8]) -> String {
    let body = if bytes.starts_with(&[0xFE, 0xFF]) {
        &bytes[2..]
    } else {
        bytes
    };
    if body.len() % 2 != 0 {
        return body.iter().map(|&b| b as char).collect();
    }
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|p| u16::from_be_bytes([p[0], p[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn parse_rect(obj: &[u8]) -> Option<[f64; 4]> {
    let pos = find(obj, b"/Rect")?;
    let after = &obj[pos + 5..];
    let open = find(after, b"[")?;
    let close = find(after, b"]")?;
    let nums: Vec<f64> = std::str::from_utf8(&after[open + 1..close])
        .ok()?
        .split_ascii_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    if nums.len() < 4 {
        return None;
    }
    Some([nums[0], nums[1], nums[2], nums[3]])
}

// ============================================================================
// Byte-level helpers
// ============================================================================

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

fn skip_ws(data: &[u8]) -> &[u8] {
    let n = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[n..]
}

fn read_uint(data: &[u8]) -> Option<(u64, &[u8])> {
    let end = data.iter().position(|b| !b.is_ascii_digit())?;
    if end == 0 {
        return None;
    }
    let value = std::str::from_utf8(&data[..end]).ok()?.parse().ok()?;
    Some((value, &data[end..]))
}

/// All `n g R` references inside a byte slice, in order
pub(crate) fn parse_refs(data: &[u8]) -> Vec<ObjectRef> {
    let mut refs = Vec::new();
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'R'
            && (i + 1 >= data.len() || !data[i + 1].is_ascii_alphanumeric())
            && i >= 4
        {
            // Walk back "num gen R"
            let mut j = i - 1;
            while j > 0 && data[j] == b' ' {
                j -= 1;
            }
            let gen_end = j + 1;
            while j > 0 && data[j].is_ascii_digit() {
                j -= 1;
            }
            let gen_start = if data[j].is_ascii_digit() { j } else { j + 1 };
            if gen_start == 0 || gen_start == gen_end || data[gen_start - 1] != b' ' {
                i += 1;
                continue;
            }
            let mut k = gen_start - 1;
            while k > 0 && data[k] == b' ' {
                k -= 1;
            }
            let num_end = k + 1;
            while k > 0 && data[k].is_ascii_digit() {
                k -= 1;
            }
            let num_start = if data[k].is_ascii_digit() { k } else { k + 1 };
            if num_start == num_end {
                i += 1;
                continue;
            }
            let num = std::str::from_utf8(&data[num_start..num_end])
                .ok()
                .and_then(|s| s.parse().ok());
            let generation = std::str::from_utf8(&data[gen_start..gen_end])
                .ok()
                .and_then(|s| s.parse().ok());
            if let (Some(num), Some(generation)) = (num, generation) {
                refs.push(ObjectRef { num, generation });
            }
        }
        i += 1;
    }
    refs
}

/// Last `<key> n g R` match in the region
pub(crate) fn find_last_ref_value(data: &[u8], key: &[u8]) -> Option<ObjectRef> {
    let mut result = None;
    let mut i = 0;
    while let Some(pos) = find(&data[i..], key) {
        let at = i + pos;
        let after = &data[at + key.len()..];
        // Reject longer keys sharing this prefix (e.g. /Root vs /RootX)
        if after
            .first()
            .is_some_and(|b| b.is_ascii_alphanumeric())
        {
            i = at + key.len();
            continue;
        }
        let tail = skip_ws(after);
        if let Some((num, rest)) = read_uint(tail) {
            let rest = skip_ws(rest);
            if let Some((generation, rest)) = read_uint(rest) {
                if skip_ws(rest).starts_with(b"R") {
                    result = Some(ObjectRef {
                        num: num as u32,
                        generation: generation as u16,
                    });
                }
            }
        }
        i = at + key.len();
    }
    result
}

/// Last `<key> <integer>` match in the region
pub(crate) fn find_last_int_value(data: &[u8], key: &[u8]) -> Option<u64> {
    let mut result = None;
    let mut i = 0;
    while let Some(pos) = find(&data[i..], key) {
        let at = i + pos;
        let after = &data[at + key.len()..];
        if after
            .first()
            .is_some_and(|b| b.is_ascii_alphanumeric())
        {
            i = at + key.len();
            continue;
        }
        if let Some((value, _)) = read_uint(skip_ws(after)) {
            result = Some(value);
        }
        i = at + key.len();
    }
    result
}

/// First `<key> <integer>` match (used for /Prev chasing within one trailer)
fn find_int_value(data: &[u8], key: &[u8]) -> Option<u64> {
    let pos = find(data, key)?;
    let after = skip_ws(&data[pos + key.len()..]);
    read_uint(after).map(|(v, _)| v)
}

/// Last `/ID [<hex><hex>]` match
fn find_last_id_value(data: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let pos = rfind(data, b"/ID")?;
    let after = &data[pos + 3..];
    let open = find(after, b"[")?;
    let close = find(after, b"]")?;
    if close < open {
        return None;
    }
    let array = &after[open + 1..close];
    let mut parts = Vec::new();
    let mut i = 0;
    while let Some(lt) = find(&array[i..], b"<") {
        let start = i + lt + 1;
        let gt = find(&array[start..], b">")?;
        let hex: Vec<u8> = array[start..start + gt]
            .iter()
            .copied()
            .filter(|b| b.is_ascii_hexdigit())
            .collect();
        let mut bytes = Vec::with_capacity(hex.len() / 2);
        for pair in hex.chunks_exact(2) {
            let s = std::str::from_utf8(pair).ok()?;
            bytes.push(u8::from_str_radix(s, 16).ok()?);
        }
        parts.push(bytes);
        i = start + gt + 1;
    }
    if parts.len() < 2 {
        return None;
    }
    let second = parts.pop()?;
    let first = parts.pop()?;
    Some((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testpdf::minimal_pdf;

    #[test]
    fn test_parse_minimal_pdf() {
        let pdf = minimal_pdf();
        let snap = StructuralSnapshot::parse(&pdf).unwrap();
        assert_eq!(snap.version, "1.7");
        assert_eq!(snap.pages.len(), 1);
        assert_eq!(snap.pages[0].number, 1);
        assert!(snap.signature_fields.is_empty());
        assert!(snap.max_object_number >= 4);
        assert_eq!(snap.trailer.root.num, 1);
    }

    #[test]
    fn test_missing_startxref() {
        let err = StructuralSnapshot::parse(b"%PDF-1.7\nnothing here").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Structure(StructureError::MissingStartXref)
        ));
    }

    #[test]
    fn test_not_a_pdf() {
        let err = StructuralSnapshot::parse(b"hello world").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Structure(StructureError::NotAPdf)
        ));
    }

    #[test]
    fn test_missing_root() {
        // Valid xref pointing at an object that is not a Catalog
        let pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /Pages >>\nendobj\nxref\n0 2\n0000000000 65535 f \n0000000009 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n47\n%%EOF";
        let err = StructuralSnapshot::parse(pdf).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Structure(StructureError::MissingRoot)
        ));
    }

    #[test]
    fn test_circular_prev_chain_rejected() {
        let head = "%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n";
        let xref_off = head.len();
        let pdf = format!(
            "{head}xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \n\
             trailer\n<< /Size 2 /Root 1 0 R /Prev {xref_off} >>\nstartxref\n{xref_off}\n%%EOF"
        );
        let err = StructuralSnapshot::parse(pdf.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Structure(StructureError::MalformedXref(_))
        ));
    }

    #[test]
    fn test_scan_objects_last_occurrence_wins() {
        let data = b"%PDF-1.5\n3 0 obj\n<< >>\nendobj\nmore\n3 0 obj\n<< /New true >>\nendobj\n";
        let xref = scan_objects(data);
        let entry = xref.get(&3).unwrap();
        // Offset of the second occurrence
        assert_eq!(entry.offset, rfind(data, b"3 0 obj").unwrap() as u64);
    }

    #[test]
    fn test_fallback_parse_without_classic_xref() {
        // startxref points at a non-"xref" offset (as an xref stream would);
        // the object scan must still find the catalog and pages.
        let pdf = minimal_pdf();
        let snap = StructuralSnapshot::parse(&pdf).unwrap();
        let mut tampered = pdf.clone();
        // Point startxref at the catalog object instead of the table
        let sx = rfind(&tampered, b"startxref").unwrap();
        let digits_at = sx + "startxref\n".len();
        let old = snap.startxref.to_string();
        let new = format!("{:0width$}", 9, width = old.len());
        tampered[digits_at..digits_at + old.len()].copy_from_slice(new.as_bytes());
        let snap2 = StructuralSnapshot::parse(&tampered).unwrap();
        assert_eq!(snap2.pages.len(), 1);
        assert_eq!(snap2.trailer.root.num, snap.trailer.root.num);
    }

    #[test]
    fn test_parse_refs() {
        let refs = parse_refs(b"[3 0 R 12 0 R] /Parent 2 0 R");
        let nums: Vec<u32> = refs.iter().map(|r| r.num).collect();
        assert_eq!(nums, vec![3, 12, 2]);
    }

    #[test]
    fn test_find_last_ref_prefers_later_match() {
        let data = b"/Root 1 0 R garbage /Root 5 0 R";
        assert_eq!(find_last_ref_value(data, b"/Root").unwrap().num, 5);
    }

    #[test]
    fn test_key_prefix_not_confused() {
        // /Rooted must not match /Root
        let data = b"/Rooted 9 0 R /Root 2 0 R";
        assert_eq!(find_last_ref_value(data, b"/Root").unwrap().num, 2);
    }

    #[test]
    fn test_field_name_literal_and_hex() {
        let obj = b"1 0 obj << /FT /Sig /T (Signature1) >> endobj";
        assert_eq!(parse_field_name(obj).unwrap(), "Signature1");
        // UTF-16BE "Sig" with BOM
        let obj2 = b"1 0 obj << /FT /Sig /T <FEFF005300690067> >> endobj";
        assert_eq!(parse_field_name(obj2).unwrap(), "Sig");
    }

    #[test]
    fn test_rect_parsing() {
        let obj = b"<< /Rect [10 20.5 110 70] >>";
        assert_eq!(parse_rect(obj).unwrap(), [10.0, 20.5, 110.0, 70.0]);
    }
}
