//! OCSP client
//!
//! Fetches a signed OCSP response for the signer certificate so it can be
//! embedded in the document security store. Fetching is best-effort: any
//! failure (no AIA URL, transport error, unsuccessful responseStatus) logs
//! a warning and yields `None`, never an error. A missing revocation proof
//! degrades long-term validation; it must not abort signing.

use crate::asn1::{self, octet_string, sequence, DerReader, TAG_SEQUENCE};
use crate::error::Result;
use crate::x509::SignerCertificate;
use sha1::{Digest, Sha1};
use std::time::Duration;
use tracing::{debug, warn};

const TAG_ENUMERATED: u8 = 0x0A;
const OCSP_RESPONSE_SUCCESSFUL: u8 = 0;

/// Client for the responder named in the certificate's AIA extension
#[derive(Debug)]
pub struct OcspClient {
    timeout: Duration,
}

impl Default for OcspClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OcspClient {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full OCSPResponse DER for `cert`, or `None` when no proof could be
    /// obtained. `issuer` is the certificate that issued `cert`; CertID
    /// hashes are computed from its subject name and public key.
    pub fn fetch(
        &self,
        cert: &SignerCertificate<'_>,
        issuer: &SignerCertificate<'_>,
    ) -> Option<Vec<u8>> {
        let url = match cert.ocsp_responder_url() {
            Ok(Some(url)) => url,
            Ok(None) => {
                debug!("certificate carries no OCSP responder URL");
                return None;
            }
            Err(e) => {
                warn!("AIA extension parse failed: {}", e);
                return None;
            }
        };

        let request = match build_ocsp_request(cert, issuer) {
            Ok(req) => req,
            Err(e) => {
                warn!("OCSP request build failed: {}", e);
                return None;
            }
        };

        debug!(url = %url, "fetching OCSP response");
        let client = match reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                warn!("OCSP client build failed: {}", e);
                return None;
            }
        };
        let response = match client
            .post(&url)
            .header("Content-Type", "application/ocsp-request")
            .body(request)
            .send()
        {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, "OCSP request failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), "OCSP responder returned HTTP error");
            return None;
        }
        let body = match response.bytes() {
            Ok(b) => b.to_vec(),
            Err(e) => {
                warn!("OCSP response read failed: {}", e);
                return None;
            }
        };

        match response_status(&body) {
            Ok(OCSP_RESPONSE_SUCCESSFUL) => Some(body),
            Ok(status) => {
                warn!(status, "OCSP responder declined the request");
                None
            }
            Err(e) => {
                warn!("OCSP response parse failed: {}", e);
                None
            }
        }
    }
}

/// OCSPRequest with a single CertID. No nonce: public responders serve
/// pre-produced responses and a nonce forces a slower signed path.
pub(crate) fn build_ocsp_request(
    cert: &SignerCertificate<'_>,
    issuer: &SignerCertificate<'_>,
) -> Result<Vec<u8>> {
    let issuer_name_hash = Sha1::digest(issuer.subject()?);
    let issuer_key_hash = Sha1::digest(issuer.public_key_bits()?);

    let cert_id = sequence(&[
        &asn1::algorithm_identifier(asn1::OID_SHA1),
        &octet_string(&issuer_name_hash),
        &octet_string(&issuer_key_hash),
        &asn1::integer(cert.serial_number()?),
    ]);
    let request = sequence(&[&cert_id]);
    let request_list = sequence(&[&request]);
    let tbs_request = sequence(&[&request_list]);
    Ok(sequence(&[&tbs_request]))
}

/// responseStatus ENUMERATED of an OCSPResponse
pub(crate) fn response_status(der: &[u8]) -> Result<u8> {
    let mut resp = DerReader::new(der).nested(TAG_SEQUENCE)?;
    let status = resp.read(TAG_ENUMERATED)?;
    Ok(*status.last().unwrap_or(&0xFF))
}
