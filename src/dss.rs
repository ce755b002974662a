//! Document Security Store builder (PAdES LTV)
//!
//! Collects the validation material gathered at signing time (certificates,
//! OCSP responses, CRLs) and lays it out as a /DSS dictionary with per-
//! signature /VRI entries, so the document stays verifiable after the
//! revocation endpoints disappear.

use crate::object::{IndirectObject, PdfDict, PdfValue};
use crate::update::ObjectNumberAllocator;
use sha1::{Digest, Sha1};
use tracing::debug;

#[derive(Debug, Default)]
struct VriEntry {
    certs: Vec<usize>,
    ocsps: Vec<usize>,
    crls: Vec<usize>,
}

/// Accumulates validation data for one or more signatures. Identical blobs
/// contributed by different signatures are stored once and shared.
#[derive(Debug, Default)]
pub struct DssBuilder {
    certs: Vec<Vec<u8>>,
    ocsps: Vec<Vec<u8>>,
    crls: Vec<Vec<u8>>,
    vri: Vec<(String, VriEntry)>,
}

impl DssBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.vri.is_empty()
    }

    /// Register validation material for one signature.
    /// `signature_contents` is the full byte string stored in the
    /// signature's /Contents entry, zero padding included; its SHA-1 in
    /// uppercase hex is the /VRI key mandated by PAdES.
    pub fn add_signature_validation(
        &mut self,
        signature_contents: &[u8],
        certs: &[Vec<u8>],
        ocsps: &[Vec<u8>],
        crls: &[Vec<u8>],
    ) {
        let key = vri_key(signature_contents);
        let mut entry = VriEntry::default();
        for cert in certs {
            entry.certs.push(intern(&mut self.certs, cert));
        }
        for ocsp in ocsps {
            entry.ocsps.push(intern(&mut self.ocsps, ocsp));
        }
        for crl in crls {
            entry.crls.push(intern(&mut self.crls, crl));
        }
        debug!(
            vri = %key,
            certs = entry.certs.len(),
            ocsps = entry.ocsps.len(),
            crls = entry.crls.len(),
            "validation material registered"
        );
        self.vri.push((key, entry));
    }

    /// Emit the pooled streams and the DSS dictionary. Returns the objects
    /// to append and the object number of the DSS dictionary (for the
    /// Catalog's /DSS entry).
    pub fn build_objects(&self, alloc: &mut ObjectNumberAllocator) -> (Vec<IndirectObject>, u32) {
        let mut objects = Vec::new();

        let cert_refs = emit_streams(&self.certs, alloc, &mut objects);
        let ocsp_refs = emit_streams(&self.ocsps, alloc, &mut objects);
        let crl_refs = emit_streams(&self.crls, alloc, &mut objects);

        let mut vri_dict = PdfDict::new();
        for (key, entry) in &self.vri {
            let mut one = PdfDict::new();
            if !entry.certs.is_empty() {
                one.set("Cert", ref_array(&entry.certs, &cert_refs));
            }
            if !entry.ocsps.is_empty() {
                one.set("OCSP", ref_array(&entry.ocsps, &ocsp_refs));
            }
            if !entry.crls.is_empty() {
                one.set("CRL", ref_array(&entry.crls, &crl_refs));
            }
            vri_dict.set(key, PdfValue::Dict(one));
        }

        let mut dss = PdfDict::new();
        dss.set("Type", PdfValue::name("DSS"));
        if !cert_refs.is_empty() {
            dss.set("Certs", all_refs(&cert_refs));
        }
        if !ocsp_refs.is_empty() {
            dss.set("OCSPs", all_refs(&ocsp_refs));
        }
        if !crl_refs.is_empty() {
            dss.set("CRLs", all_refs(&crl_refs));
        }
        dss.set("VRI", PdfValue::Dict(vri_dict));

        let dss_num = alloc.next();
        objects.push(IndirectObject::from_dict(dss_num, &dss));
        (objects, dss_num)
    }
}

/// Uppercase hex SHA-1 of the signature contents
pub(crate) fn vri_key(signature_contents: &[u8]) -> String {
    Sha1::digest(signature_contents)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect()
}

/// Index of `bytes` in the pool, appending only when not already present
fn intern(pool: &mut Vec<Vec<u8>>, bytes: &[u8]) -> usize {
    if let Some(idx) = pool.iter().position(|existing| existing == bytes) {
        return idx;
    }
    pool.push(bytes.to_vec());
    pool.len() - 1
}

fn emit_streams(
    pool: &[Vec<u8>],
    alloc: &mut ObjectNumberAllocator,
    objects: &mut Vec<IndirectObject>,
) -> Vec<u32> {
    pool.iter()
        .map(|payload| {
            let num = alloc.next();
            objects.push(IndirectObject::stream(num, PdfDict::new(), payload));
            num
        })
        .collect()
}

fn ref_array(indexes: &[usize], refs: &[u32]) -> PdfValue {
    PdfValue::Array(indexes.iter().map(|&i| PdfValue::reference(refs[i])).collect())
}

fn all_refs(refs: &[u32]) -> PdfValue {
    PdfValue::Array(refs.iter().map(|&n| PdfValue::reference(n)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::StructuralSnapshot;
    use crate::testpdf::minimal_pdf;

    fn fresh_alloc() -> (Vec<u8>, ObjectNumberAllocator) {
        let pdf = minimal_pdf();
        let snap = StructuralSnapshot::parse(&pdf).unwrap();
        let alloc = ObjectNumberAllocator::new(&snap);
        (pdf, alloc)
    }

    #[test]
    fn test_vri_key_is_uppercase_sha1_hex() {
        let key = vri_key(b"abc");
        assert_eq!(key, "A9993E364706816ABA3E25717850C26C9CD0D89D");
        assert_eq!(key.len(), 40);
    }

    #[test]
    fn test_shared_blobs_stored_once() {
        let mut dss = DssBuilder::new();
        let ca = vec![0x30, 0x01, 0x00];
        dss.add_signature_validation(b"sig-one", &[ca.clone()], &[], &[]);
        dss.add_signature_validation(b"sig-two", &[ca.clone()], &[], &[]);
        assert_eq!(dss.certs.len(), 1);
        assert_eq!(dss.vri.len(), 2);
    }

    #[test]
    fn test_build_objects_layout() {
        let (_, mut alloc) = fresh_alloc();
        let mut dss = DssBuilder::new();
        let cert = vec![0x30, 0x01, 0x01];
        let ocsp = vec![0x30, 0x01, 0x02];
        dss.add_signature_validation(b"signature bytes", &[cert], &[ocsp], &[]);

        let (objects, dss_num) = dss.build_objects(&mut alloc);
        // cert stream + ocsp stream + DSS dict
        assert_eq!(objects.len(), 3);
        assert_eq!(objects.last().unwrap().num, dss_num);

        let dss_body = String::from_utf8_lossy(&objects.last().unwrap().body).into_owned();
        assert!(dss_body.contains("/Type /DSS"));
        assert!(dss_body.contains("/Certs ["));
        assert!(dss_body.contains("/OCSPs ["));
        assert!(!dss_body.contains("/CRLs"));
        let key = vri_key(b"signature bytes");
        assert!(dss_body.contains(&format!("/{}", key)));
        assert!(dss_body.contains("/Cert ["));
        assert!(dss_body.contains("/OCSP ["));
    }

    #[test]
    fn test_empty_builder() {
        let dss = DssBuilder::new();
        assert!(dss.is_empty());
    }
}
