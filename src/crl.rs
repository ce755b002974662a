//! CRL fetching
//!
//! Downloads certificate revocation lists from the URLs named in the CRL
//! Distribution Points extension. Like OCSP, this is best-effort: a URL
//! that fails to download or parse is skipped with a warning, and an empty
//! result is a valid outcome.

use crate::x509::{pem_to_der, SignerCertificate};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn};

/// Oversized responses are dropped rather than embedded in the document
const MAX_CRL_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug)]
pub struct CrlFetcher {
    timeout: Duration,
}

impl Default for CrlFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CrlFetcher {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// DER bytes of every CRL that could be fetched for `cert`
    pub fn fetch(&self, cert: &SignerCertificate<'_>) -> Vec<Vec<u8>> {
        let urls = match cert.crl_distribution_urls() {
            Ok(urls) => urls,
            Err(e) => {
                warn!("CRLDP extension parse failed: {}", e);
                return Vec::new();
            }
        };
        if urls.is_empty() {
            debug!("certificate carries no CRL distribution points");
            return Vec::new();
        }

        let client = match reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                warn!("CRL client build failed: {}", e);
                return Vec::new();
            }
        };

        let mut crls = Vec::new();
        for url in urls {
            match self.fetch_one(&client, &url) {
                Some(der) => {
                    debug!(url = %url, len = der.len(), "CRL downloaded");
                    crls.push(der);
                }
                None => warn!(url = %url, "CRL download skipped"),
            }
        }
        crls
    }

    fn fetch_one(&self, client: &reqwest::blocking::Client, url: &str) -> Option<Vec<u8>> {
        let response = client.get(url).send().ok()?;
        if !response.status().is_success() {
            return None;
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_CRL_BYTES as u64)
        {
            warn!(url = %url, "CRL exceeds size cap");
            return None;
        }
        let body = read_capped(response, MAX_CRL_BYTES)?;
        Some(normalize_crl(&body))
    }
}

/// Read at most `cap` bytes; a longer body is dropped rather than buffered.
/// Guards against responders that omit or lie about Content-Length.
fn read_capped(reader: impl Read, cap: usize) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    reader.take(cap as u64 + 1).read_to_end(&mut body).ok()?;
    if body.len() > cap {
        return None;
    }
    Some(body)
}

/// CRLs are usually served as DER but some endpoints return PEM
fn normalize_crl(body: &[u8]) -> Vec<u8> {
    if body.starts_with(b"-----BEGIN") {
        if let Ok(text) = std::str::from_utf8(body) {
            if let Ok(der) = pem_to_der(text, "X509 CRL") {
                return der;
            }
        }
    }
    body.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn test_der_body_passes_through() {
        let der = vec![0x30, 0x03, 0x02, 0x01, 0x00];
        assert_eq!(normalize_crl(&der), der);
    }

    #[test]
    fn test_pem_body_unwrapped() {
        let der = vec![0x30, 0x03, 0x02, 0x01, 0x00];
        let b64 = base64::engine::general_purpose::STANDARD.encode(&der);
        let pem = format!("-----BEGIN X509 CRL-----\n{}\n-----END X509 CRL-----\n", b64);
        assert_eq!(normalize_crl(pem.as_bytes()), der);
    }

    #[test]
    fn test_unparseable_pem_returned_verbatim() {
        let junk = b"-----BEGIN SOMETHING ELSE-----";
        assert_eq!(normalize_crl(junk), junk.to_vec());
    }

    #[test]
    fn test_read_capped_rejects_oversized_body() {
        let over = vec![0u8; 33];
        assert!(read_capped(std::io::Cursor::new(over), 32).is_none());
        let exact = vec![1u8; 32];
        assert_eq!(
            read_capped(std::io::Cursor::new(exact.clone()), 32).unwrap(),
            exact
        );
    }

    #[test]
    fn test_no_crldp_is_empty() {
        use crate::asn1::{
            algorithm_identifier, bit_string, context, integer, oid, sequence, set,
            utc_time, utf8_string, OID_RSA_ENCRYPTION, OID_SHA256_RSA,
        };
        let name = sequence(&[&set(&[&sequence(&[
            &oid(&[0x55, 0x04, 0x03]),
            &utf8_string("NoCrl"),
        ])])]);
        let validity = sequence(&[&utc_time("240101000000Z"), &utc_time("340101000000Z")]);
        let spki = sequence(&[
            &algorithm_identifier(OID_RSA_ENCRYPTION),
            &bit_string(&[0x01]),
        ]);
        let tbs = sequence(&[
            &context(0, &integer(&[2])),
            &integer(&[1]),
            &algorithm_identifier(OID_SHA256_RSA),
            &name,
            &validity,
            &name,
            &spki,
        ]);
        let der = sequence(&[
            &tbs,
            &algorithm_identifier(OID_SHA256_RSA),
            &bit_string(&[0xAA]),
        ]);
        let cert = SignerCertificate::new(&der);
        assert!(CrlFetcher::new().fetch(&cert).is_empty());
    }
}
