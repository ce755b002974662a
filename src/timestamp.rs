//! RFC 3161 timestamp client
//!
//! Builds a TimeStampReq over the signature value, posts it to a TSA over
//! HTTP, and returns the TimeStampToken DER verbatim for embedding as the
//! id-aa-signatureTimeStampToken unsigned attribute.

use crate::asn1::{
    self, boolean, integer, octet_string, sequence, DerReader, TAG_INTEGER, TAG_SEQUENCE,
    TAG_UTF8_STRING,
};
use crate::error::{Error, Result};
use crate::provider::HashAlgorithm;
use rand::RngCore;
use std::time::Duration;
use tracing::debug;

/// PKIStatus values that carry a usable token
const PKI_STATUS_GRANTED: u8 = 0;
const PKI_STATUS_GRANTED_WITH_MODS: u8 = 1;

/// Timestamp authority endpoint configuration
#[derive(Debug, Clone)]
pub struct TsaConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl TsaConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// DigiCert public TSA
    pub fn digicert() -> Self {
        Self::new("http://timestamp.digicert.com")
    }

    /// Sectigo public TSA
    pub fn sectigo() -> Self {
        Self::new("http://timestamp.sectigo.com")
    }

    /// Apple public TSA
    pub fn apple() -> Self {
        Self::new("http://timestamp.apple.com/ts01")
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for one TSA endpoint
#[derive(Debug)]
pub struct TimestampClient {
    config: TsaConfig,
}

impl TimestampClient {
    pub fn new(config: TsaConfig) -> Self {
        Self { config }
    }

    /// Request a timestamp over `message` (the CMS signature value).
    /// Returns the TimeStampToken DER. A PKIStatus other than granted or
    /// grantedWithMods is [`Error::TimestampRejected`]; transport failures
    /// surface as [`Error::Http`] so callers can tell the two apart.
    pub fn timestamp(&self, message: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>> {
        let digest = hash.digest(message);
        let mut nonce = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut nonce);
        let request = build_timestamp_request(&digest, hash, &nonce);

        debug!(url = %self.config.url, "requesting RFC 3161 timestamp");
        let client = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| Error::Http(format!("TSA client build failed: {}", e)))?;

        let mut post = client
            .post(&self.config.url)
            .header("Content-Type", "application/timestamp-query")
            .body(request);
        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            post = post.basic_auth(user, Some(pass));
        }

        let response = post
            .send()
            .map_err(|e| Error::Http(format!("TSA request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "TSA returned HTTP {}",
                response.status()
            )));
        }
        let body = response
            .bytes()
            .map_err(|e| Error::Http(format!("TSA response read failed: {}", e)))?;

        let token = parse_timestamp_response(&body)?;
        debug!(token_len = token.len(), "timestamp token received");
        Ok(token)
    }
}

/// TimeStampReq: version 1, messageImprint over the digest, a random nonce,
/// and certReq TRUE so the token carries the TSA certificate.
pub(crate) fn build_timestamp_request(
    digest: &[u8],
    hash: HashAlgorithm,
    nonce: &[u8],
) -> Vec<u8> {
    let message_imprint = sequence(&[
        &asn1::algorithm_identifier(hash.oid()),
        &octet_string(digest),
    ]);
    sequence(&[
        &integer(&[1]),
        &message_imprint,
        &integer(nonce),
        &boolean(true),
    ])
}

/// Extract the TimeStampToken from a TimeStampResp
pub(crate) fn parse_timestamp_response(der: &[u8]) -> Result<Vec<u8>> {
    let mut resp = DerReader::new(der).nested(TAG_SEQUENCE)?;
    let mut status_info = resp.nested(TAG_SEQUENCE)?;
    let status_bytes = status_info.read(TAG_INTEGER)?;
    let status = *status_bytes.last().unwrap_or(&0xFF);

    if status != PKI_STATUS_GRANTED && status != PKI_STATUS_GRANTED_WITH_MODS {
        let message = read_status_string(&mut status_info).unwrap_or_default();
        return Err(Error::TimestampRejected { status, message });
    }

    if resp.is_empty() {
        return Err(Error::Asn1("granted TimeStampResp carries no token".into()));
    }
    // ContentInfo, verbatim
    Ok(resp.read_tlv()?.to_vec())
}

/// First string of the optional PKIFreeText statusString
fn read_status_string(status_info: &mut DerReader<'_>) -> Option<String> {
    if status_info.peek_tag() != Some(TAG_SEQUENCE) {
        return None;
    }
    let mut free_text = status_info.nested(TAG_SEQUENCE).ok()?;
    let text = free_text.read(TAG_UTF8_STRING).ok()?;
    Some(String::from_utf8_lossy(text).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::{context, oid, utf8_string, TAG_BOOLEAN, TAG_OCTET_STRING, TAG_OID};

    #[test]
    fn test_request_structure() {
        let digest = HashAlgorithm::Sha256.digest(b"signature bytes");
        let nonce = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let req = build_timestamp_request(&digest, HashAlgorithm::Sha256, &nonce);

        let mut r = DerReader::new(&req).nested(TAG_SEQUENCE).unwrap();
        assert_eq!(r.read(TAG_INTEGER).unwrap(), &[1]);
        let mut imprint = r.nested(TAG_SEQUENCE).unwrap();
        let mut alg = imprint.nested(TAG_SEQUENCE).unwrap();
        assert_eq!(alg.read(TAG_OID).unwrap(), asn1::OID_SHA256);
        assert_eq!(imprint.read(TAG_OCTET_STRING).unwrap(), digest.as_slice());
        assert_eq!(r.read(TAG_INTEGER).unwrap(), nonce.as_slice());
        assert_eq!(r.read(TAG_BOOLEAN).unwrap(), &[0xFF]);
        assert!(r.is_empty());
    }

    #[test]
    fn test_granted_response_yields_token() {
        let token = sequence(&[&oid(asn1::OID_SIGNED_DATA), &context(0, b"tst-info")]);
        let resp = sequence(&[&sequence(&[&integer(&[0])]), &token]);
        let parsed = parse_timestamp_response(&resp).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_granted_with_mods_accepted() {
        let token = sequence(&[&oid(asn1::OID_SIGNED_DATA)]);
        let resp = sequence(&[&sequence(&[&integer(&[1])]), &token]);
        assert!(parse_timestamp_response(&resp).is_ok());
    }

    #[test]
    fn test_rejection_is_hard_error() {
        let status_info = sequence(&[
            &integer(&[2]),
            &sequence(&[&utf8_string("request rejected by policy")]),
        ]);
        let resp = sequence(&[&status_info]);
        let err = parse_timestamp_response(&resp).unwrap_err();
        match err {
            Error::TimestampRejected { status, message } => {
                assert_eq!(status, 2);
                assert!(message.contains("policy"));
            }
            other => panic!("expected TimestampRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_granted_without_token_is_error() {
        let resp = sequence(&[&sequence(&[&integer(&[0])])]);
        let err = parse_timestamp_response(&resp).unwrap_err();
        assert!(matches!(err, Error::Asn1(_)));
    }

    #[test]
    fn test_well_known_endpoints() {
        assert!(TsaConfig::digicert().url.contains("digicert"));
        assert!(TsaConfig::sectigo().url.contains("sectigo"));
        let cfg = TsaConfig::new("http://tsa.example")
            .with_credentials("user", "pass")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(cfg.username.as_deref(), Some("user"));
        assert_eq!(cfg.timeout, Duration::from_secs(5));
    }
}
