//! Incremental update writer
//!
//! Appends new objects after the original document bytes, followed by a
//! classic cross-reference section and a trailer chained to the previous
//! revision via `/Prev`. The original bytes are never modified, which is
//! what keeps earlier signatures over those bytes valid.

use crate::object::{IndirectObject, PdfDict, PdfValue};
use crate::structure::StructuralSnapshot;
use std::fmt::Write as _;

/// Hands out object numbers for a single update, starting just past the
/// highest number the parsed document uses. Numbers are never reused.
#[derive(Debug)]
pub struct ObjectNumberAllocator {
    next: u32,
}

impl ObjectNumberAllocator {
    pub fn new(snapshot: &StructuralSnapshot) -> Self {
        Self {
            next: snapshot.max_object_number + 1,
        }
    }

    pub fn next(&mut self) -> u32 {
        let n = self.next;
        self.next += 1;
        n
    }

    /// Highest number handed out so far, plus one
    pub fn watermark(&self) -> u32 {
        self.next
    }
}

/// Collects the objects of one revision and serializes them as an
/// incremental update. Objects may arrive in any order; the xref section
/// sorts them and emits one subsection per contiguous run of numbers.
#[derive(Debug)]
pub struct IncrementalUpdateWriter {
    objects: Vec<IndirectObject>,
}

impl IncrementalUpdateWriter {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    pub fn add_object(&mut self, object: IndirectObject) -> &mut Self {
        self.objects.push(object);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Serialize the update and return the complete new document buffer.
    /// `original` is copied verbatim; everything new lands after it.
    pub fn append_to(&self, original: &[u8], snapshot: &StructuralSnapshot) -> Vec<u8> {
        let mut out = original.to_vec();
        if !out.ends_with(b"\n") {
            out.push(b'\n');
        }

        let mut objects: Vec<&IndirectObject> = self.objects.iter().collect();
        objects.sort_by_key(|o| o.num);

        let mut offsets = Vec::with_capacity(objects.len());
        for obj in &objects {
            offsets.push((obj.num, out.len() as u64));
            let mut header = String::new();
            let _ = write!(header, "{} 0 obj\n", obj.num);
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(&obj.body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = out.len() as u64;
        let mut xref = String::from("xref\n");
        // Head of the free list is always re-stated
        xref.push_str("0 1\n0000000000 65535 f \n");
        for run in contiguous_runs(&offsets) {
            let _ = write!(xref, "{} {}\n", run[0].0, run.len());
            for (_, offset) in run {
                let _ = write!(xref, "{:010} 00000 n \n", offset);
            }
        }
        out.extend_from_slice(xref.as_bytes());

        let max_new = objects.last().map(|o| o.num).unwrap_or(0);
        let size = snapshot.trailer.size.max(max_new + 1);
        let mut trailer = PdfDict::new();
        trailer.set("Size", PdfValue::Integer(size as i64));
        trailer.set("Root", PdfValue::Reference(snapshot.trailer.root));
        if let Some(info) = snapshot.trailer.info {
            trailer.set("Info", PdfValue::Reference(info));
        }
        if let Some((a, b)) = &snapshot.trailer.id {
            trailer.set(
                "ID",
                PdfValue::Array(vec![
                    PdfValue::HexString(a.clone()),
                    PdfValue::HexString(b.clone()),
                ]),
            );
        }
        trailer.set("Prev", PdfValue::Integer(snapshot.startxref as i64));

        let mut tail = String::from("trailer\n");
        tail.push_str(&trailer.serialize());
        let _ = write!(tail, "\nstartxref\n{}\n%%EOF\n", xref_offset);
        out.extend_from_slice(tail.as_bytes());
        out
    }
}

impl Default for IncrementalUpdateWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Split sorted (num, offset) pairs into runs of consecutive numbers
fn contiguous_runs(offsets: &[(u32, u64)]) -> Vec<&[(u32, u64)]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..offsets.len() {
        if offsets[i].0 != offsets[i - 1].0 + 1 {
            runs.push(&offsets[start..i]);
            start = i;
        }
    }
    if !offsets.is_empty() {
        runs.push(&offsets[start..]);
    }
    runs
}
