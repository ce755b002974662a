//! Hand-built PDF fixtures for unit tests. Offsets are computed while the
//! buffer is assembled so the classic xref table is always self-consistent.

use std::fmt::Write as _;

/// One-page document with a valid classic xref table and trailer.
pub fn minimal_pdf() -> Vec<u8> {
    let objects: [&str; 4] = [
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
        "<< /Length 36 >>\nstream\nBT /F1 12 Tf 72 720 Td (hello) Tj ET\nendstream",
    ];
    build_pdf(&objects)
}

/// One-page document carrying an empty `/FT /Sig` field named `ExistingSig`,
/// wired into the page's /Annots and the Catalog's /AcroForm.
pub fn pdf_with_empty_sig_field() -> Vec<u8> {
    let objects: [&str; 5] = [
        "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [5 0 R] /SigFlags 3 >> >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [5 0 R] >>",
        "<< /Length 36 >>\nstream\nBT /F1 12 Tf 72 720 Td (hello) Tj ET\nendstream",
        "<< /Type /Annot /Subtype /Widget /FT /Sig /T (ExistingSig) /Rect [36 36 236 86] /P 3 0 R /F 4 >>",
    ];
    build_pdf(&objects)
}

fn build_pdf(objects: &[&str]) -> Vec<u8> {
    let mut buf = String::from("%PDF-1.7\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(buf.len());
        let _ = write!(buf, "{} 0 obj\n{}\nendobj\n", i + 1, body);
    }
    let xref_offset = buf.len();
    let _ = write!(buf, "xref\n0 {}\n", objects.len() + 1);
    buf.push_str("0000000000 65535 f \n");
    for off in &offsets {
        let _ = write!(buf, "{:010} 00000 n \n", off);
    }
    let _ = write!(
        buf,
        "trailer\n<< /Size {} /Root 1 0 R /ID [<A1B2C3D4A1B2C3D4A1B2C3D4A1B2C3D4> <A1B2C3D4A1B2C3D4A1B2C3D4A1B2C3D4>] >>\nstartxref\n{}\n%%EOF",
        objects.len() + 1,
        xref_offset
    );
    buf.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_offsets_are_consistent() {
        let pdf = minimal_pdf();
        let text = String::from_utf8_lossy(&pdf);
        // The first xref entry for object 1 must point at "1 0 obj"
        let line = text
            .lines()
            .find(|l| l.ends_with(" n ") || l.ends_with(" n"))
            .unwrap();
        let off: usize = line[..10].parse().unwrap();
        assert!(pdf[off..].starts_with(b"1 0 obj"));
    }
}
