//! X.509 certificate field extraction
//!
//! Reads the handful of certificate fields the signing core needs (serial,
//! issuer, public key bits, AIA and CRLDP URLs) by walking the DER
//! structure with [`DerReader`]. Whole-certificate parsing and trust-path
//! validation are out of scope.

use crate::asn1::{self, DerReader, TAG_BIT_STRING, TAG_INTEGER, TAG_OCTET_STRING, TAG_OID, TAG_SEQUENCE};
use crate::error::{Error, Result};
use base64::Engine;

/// Borrowed view over a DER-encoded certificate
#[derive(Debug, Clone, Copy)]
pub struct SignerCertificate<'a> {
    der: &'a [u8],
}

impl<'a> SignerCertificate<'a> {
    pub fn new(der: &'a [u8]) -> Self {
        Self { der }
    }

    pub fn der(&self) -> &'a [u8] {
        self.der
    }

    /// tbsCertificate, as the verbatim SEQUENCE element. These are the
    /// bytes the certificate's signature covers.
    pub fn tbs_certificate(&self) -> Result<&'a [u8]> {
        let mut cert = DerReader::new(self.der).nested(TAG_SEQUENCE)?;
        cert.read_tlv()
    }

    /// Content of the tbsCertificate SEQUENCE
    fn tbs(&self) -> Result<DerReader<'a>> {
        let mut cert = DerReader::new(self.der).nested(TAG_SEQUENCE)?;
        cert.nested(TAG_SEQUENCE)
    }

    /// Reader positioned at serialNumber (the optional explicit `[0]`
    /// version tag already consumed)
    fn tbs_at_serial(&self) -> Result<DerReader<'a>> {
        let mut tbs = self.tbs()?;
        if tbs.peek_tag() == Some(0xA0) {
            tbs.skip()?;
        }
        Ok(tbs)
    }

    /// serialNumber INTEGER content, verbatim
    pub fn serial_number(&self) -> Result<&'a [u8]> {
        self.tbs_at_serial()?.read(TAG_INTEGER)
    }

    /// issuer Name, as the verbatim SEQUENCE element (header included).
    /// CMS IssuerAndSerialNumber embeds these bytes unchanged.
    pub fn issuer(&self) -> Result<&'a [u8]> {
        let mut tbs = self.tbs_at_serial()?;
        tbs.skip()?; // serialNumber
        tbs.skip()?; // signature AlgorithmIdentifier
        tbs.read_tlv()
    }

    /// subject Name, verbatim SEQUENCE element
    pub fn subject(&self) -> Result<&'a [u8]> {
        let mut tbs = self.tbs_at_serial()?;
        tbs.skip()?; // serialNumber
        tbs.skip()?; // signature
        tbs.skip()?; // issuer
        tbs.skip()?; // validity
        tbs.read_tlv()
    }

    /// subjectPublicKey BIT STRING payload, without the unused-bits octet.
    /// OCSP CertID hashes exactly these bytes for issuerKeyHash.
    pub fn public_key_bits(&self) -> Result<&'a [u8]> {
        let mut tbs = self.tbs_at_serial()?;
        tbs.skip()?; // serialNumber
        tbs.skip()?; // signature
        tbs.skip()?; // issuer
        tbs.skip()?; // validity
        tbs.skip()?; // subject
        let mut spki = tbs.nested(TAG_SEQUENCE)?;
        spki.skip()?; // algorithm
        let bits = spki.read(TAG_BIT_STRING)?;
        if bits.is_empty() {
            return Err(Error::Asn1("empty subjectPublicKey".into()));
        }
        Ok(&bits[1..])
    }

    /// extnValue OCTET STRING content of the extension with the given OID
    pub fn extension(&self, oid_body: &[u8]) -> Result<Option<&'a [u8]>> {
        let mut tbs = self.tbs_at_serial()?;
        tbs.skip()?; // serialNumber
        tbs.skip()?; // signature
        tbs.skip()?; // issuer
        tbs.skip()?; // validity
        tbs.skip()?; // subject
        tbs.skip()?; // subjectPublicKeyInfo
        // Optional issuerUniqueID [1], subjectUniqueID [2], extensions [3]
        while !tbs.is_empty() {
            let (tag, content) = tbs.read_any()?;
            if tag != 0xA3 {
                continue;
            }
            let mut exts = DerReader::new(content).nested(TAG_SEQUENCE)?;
            while !exts.is_empty() {
                let mut ext = exts.nested(TAG_SEQUENCE)?;
                let id = ext.read(TAG_OID)?;
                if ext.peek_tag() == Some(asn1::TAG_BOOLEAN) {
                    ext.skip()?;
                }
                let value = ext.read(TAG_OCTET_STRING)?;
                if id == oid_body {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    /// OCSP responder URL from the Authority Information Access extension.
    /// `None` when the extension is absent or carries no OCSP URI.
    pub fn ocsp_responder_url(&self) -> Result<Option<String>> {
        let Some(aia) = self.extension(asn1::OID_AUTHORITY_INFO_ACCESS)? else {
            return Ok(None);
        };
        let mut descriptions = DerReader::new(aia).nested(TAG_SEQUENCE)?;
        while !descriptions.is_empty() {
            let mut access = descriptions.nested(TAG_SEQUENCE)?;
            let method = access.read(TAG_OID)?;
            if method != asn1::OID_AD_OCSP {
                continue;
            }
            // GeneralName: uniformResourceIdentifier is context tag [6]
            let (tag, location) = access.read_any()?;
            if tag == 0x86 {
                if let Ok(url) = std::str::from_utf8(location) {
                    return Ok(Some(url.to_string()));
                }
            }
        }
        Ok(None)
    }

    /// CRL Distribution Point URLs. Structural extraction first; when that
    /// finds nothing, falls back to an ASCII scan of the raw certificate for
    /// `http(s)://....crl` runs (compatibility shim for oddly-shaped CRLDP
    /// encodings; the last-found URL wins on duplicates).
    pub fn crl_distribution_urls(&self) -> Result<Vec<String>> {
        let mut urls = Vec::new();
        if let Some(crldp) = self.extension(asn1::OID_CRL_DISTRIBUTION_POINTS)? {
            collect_uri_general_names(crldp, &mut urls);
        }
        if urls.is_empty() {
            urls = scan_ascii_crl_urls(self.der);
        }
        Ok(urls)
    }
}

/// Recursively collect `[6]`-tagged IA5String URIs from nested DER content
fn collect_uri_general_names(data: &[u8], out: &mut Vec<String>) {
    let mut reader = DerReader::new(data);
    while !reader.is_empty() {
        let Ok((tag, content)) = reader.read_any() else {
            return;
        };
        if tag == 0x86 {
            if let Ok(url) = std::str::from_utf8(content) {
                out.push(url.to_string());
            }
        } else if tag & 0x20 != 0 {
            // Constructed: descend
            collect_uri_general_names(content, out);
        }
    }
}

/// Scan raw bytes for ASCII `http(s)://....crl` URLs
fn scan_ascii_crl_urls(data: &[u8]) -> Vec<String> {
    let mut urls = Vec::new();
    let mut i = 0;
    while i + 7 < data.len() {
        if &data[i..i + 7] == b"http://" || (i + 8 < data.len() && &data[i..i + 8] == b"https://") {
            let mut end = i;
            while end < data.len()
                && data[end].is_ascii_graphic()
                && data[end] != b'>'
                && data[end] != b')'
            {
                end += 1;
            }
            if let Ok(candidate) = std::str::from_utf8(&data[i..end]) {
                if candidate.ends_with(".crl") {
                    urls.push(candidate.to_string());
                }
            }
            i = end;
        } else {
            i += 1;
        }
    }
    urls
}

// ============================================================================
// PEM handling
// ============================================================================

/// Decode the first PEM block with the given label into DER bytes
pub fn pem_to_der(pem: &str, label: &str) -> Result<Vec<u8>> {
    let begin_marker = format!("-----BEGIN {}-----", label);
    let end_marker = format!("-----END {}-----", label);

    let start = pem
        .find(&begin_marker)
        .ok_or_else(|| Error::Crypto(format!("PEM begin marker not found: {}", label)))?
        + begin_marker.len();
    let end = pem
        .find(&end_marker)
        .ok_or_else(|| Error::Crypto(format!("PEM end marker not found: {}", label)))?;

    let base64_data: String = pem[start..end].chars().filter(|c| !c.is_whitespace()).collect();

    base64::engine::general_purpose::STANDARD
        .decode(&base64_data)
        .map_err(|e| Error::Crypto(format!("failed to decode PEM base64: {}", e)))
}

/// Split a concatenated PEM bundle into the DER bytes of each CERTIFICATE
pub fn pem_chain_to_der(chain_pem: &str) -> Result<Vec<Vec<u8>>> {
    let mut chain = Vec::new();
    let mut current_pos = 0;

    while let Some(start) = chain_pem[current_pos..].find("-----BEGIN CERTIFICATE-----") {
        let abs_start = current_pos + start;
        let Some(end) = chain_pem[abs_start..].find("-----END CERTIFICATE-----") else {
            break;
        };
        let abs_end = abs_start + end + "-----END CERTIFICATE-----".len();
        chain.push(pem_to_der(&chain_pem[abs_start..abs_end], "CERTIFICATE")?);
        current_pos = abs_end;
    }

    Ok(chain)
}
