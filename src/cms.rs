//! CMS SignedData builder (RFC 5652)
//!
//! Produces the detached PKCS#7 structure embedded in the signature
//! dictionary's /Contents. The document digest goes into the signed
//! attributes; the signature is computed over those attributes, not over
//! the document bytes directly.
//!
//! Tagging subtlety: signedAttrs are embedded in the SignerInfo under the
//! `[0]` IMPLICIT tag (0xA0), but the bytes handed to the signing key carry
//! the SET tag (0x31). Mixing the two produces signatures that verify
//! nowhere.

use crate::asn1::{
    self, octet_string, oid, sequence, set, tlv, utc_time, TAG_SET,
};
use crate::error::{Error, Result};
use crate::provider::{HashAlgorithm, SigningProvider};
use crate::timestamp::TimestampClient;
use crate::x509::SignerCertificate;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Builds one detached SignedData per signature
pub struct CmsSignedDataBuilder<'a> {
    provider: &'a dyn SigningProvider,
    hash: HashAlgorithm,
    timestamp: Option<&'a TimestampClient>,
    signing_time: Option<OffsetDateTime>,
}

impl<'a> CmsSignedDataBuilder<'a> {
    pub fn new(provider: &'a dyn SigningProvider, hash: HashAlgorithm) -> Self {
        Self {
            provider,
            hash,
            timestamp: None,
            signing_time: None,
        }
    }

    /// Timestamp the signature value through this TSA. A failed request,
    /// whether the TSA rejected it or the transport broke, logs a warning
    /// and the signature is produced without a token.
    pub fn with_timestamp(mut self, client: &'a TimestampClient) -> Self {
        self.timestamp = Some(client);
        self
    }

    /// Pin the signingTime attribute instead of using the current time
    pub fn with_signing_time(mut self, time: OffsetDateTime) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Build the ContentInfo DER for the given document digest (the hash
    /// over the ByteRange-covered bytes).
    pub fn build(&self, message_digest: &[u8]) -> Result<Vec<u8>> {
        if message_digest.len() != self.hash.output_len() {
            return Err(Error::Crypto(format!(
                "digest length {} does not match {:?}",
                message_digest.len(),
                self.hash
            )));
        }
        let cert_der = self.provider.certificate_der();
        let cert = SignerCertificate::new(cert_der);

        let signing_time = self.signing_time.unwrap_or_else(OffsetDateTime::now_utc);
        let attrs_content = signed_attributes(message_digest, signing_time);

        // Sign the SET-tagged form
        let to_sign = tlv(TAG_SET, &attrs_content);
        let signature = self.provider.sign(&to_sign, self.hash)?;
        debug!(sig_len = signature.len(), "CMS signature computed");

        let unsigned_attrs = self.unsigned_attributes(&signature)?;

        let sig_alg_oid = self.provider.signature_algorithm_oid(self.hash);
        let signature_algorithm = if sig_alg_oid == asn1::OID_RSA_ENCRYPTION {
            asn1::algorithm_identifier(sig_alg_oid)
        } else {
            asn1::algorithm_identifier_no_params(sig_alg_oid)
        };

        let sid = sequence(&[cert.issuer()?, &asn1::integer(cert.serial_number()?)]);
        let mut signer_info_items: Vec<Vec<u8>> = vec![
            asn1::integer(&[1]),
            sid,
            asn1::algorithm_identifier(self.hash.oid()),
            tlv(0xA0, &attrs_content),
            signature_algorithm,
            octet_string(&signature),
        ];
        if let Some(unsigned) = unsigned_attrs {
            signer_info_items.push(tlv(0xA1, &unsigned));
        }
        let refs: Vec<&[u8]> = signer_info_items.iter().map(|v| v.as_slice()).collect();
        let signer_info = sequence(&refs);

        // certificates [0] IMPLICIT: signer first, then the chain
        let mut certs_content = cert_der.to_vec();
        for extra in self.provider.chain_der() {
            certs_content.extend_from_slice(extra);
        }

        // Detached: encapContentInfo names id-data but carries no content
        let signed_data = sequence(&[
            &asn1::integer(&[1]),
            &set(&[&asn1::algorithm_identifier(self.hash.oid())]),
            &sequence(&[&oid(asn1::OID_DATA)]),
            &tlv(0xA0, &certs_content),
            &set(&[&signer_info]),
        ]);

        Ok(sequence(&[
            &oid(asn1::OID_SIGNED_DATA),
            &asn1::context(0, &signed_data),
        ]))
    }

    fn unsigned_attributes(&self, signature: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(tsa) = self.timestamp else {
            return Ok(None);
        };
        match tsa.timestamp(signature, self.hash) {
            Ok(token) => {
                let attr = sequence(&[&oid(asn1::OID_TIMESTAMP_TOKEN), &set(&[&token])]);
                Ok(Some(attr))
            }
            // Rejections and transport failures alike: the signature is
            // still valid without a token, so signing goes on
            Err(e) => {
                warn!("timestamp skipped, signing without token: {}", e);
                Ok(None)
            }
        }
    }
}

/// Signed attributes content (the bytes inside the [0]/SET wrapper):
/// contentType, signingTime, messageDigest. This order is also the DER
/// SET-of sort order since the encodings grow strictly longer.
fn signed_attributes(message_digest: &[u8], signing_time: OffsetDateTime) -> Vec<u8> {
    let content_type = sequence(&[
        &oid(asn1::OID_CONTENT_TYPE),
        &set(&[&oid(asn1::OID_DATA)]),
    ]);
    let time_attr = sequence(&[
        &oid(asn1::OID_SIGNING_TIME),
        &set(&[&utc_time(&format_utc_time(signing_time))]),
    ]);
    let digest_attr = sequence(&[
        &oid(asn1::OID_MESSAGE_DIGEST),
        &set(&[&octet_string(message_digest)]),
    ]);
    let mut out = content_type;
    out.extend_from_slice(&time_attr);
    out.extend_from_slice(&digest_attr);
    out
}

/// `YYMMDDHHMMSSZ`
fn format_utc_time(t: OffsetDateTime) -> String {
    format!(
        "{:02}{:02}{:02}{:02}{:02}{:02}Z",
        t.year().rem_euclid(100),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}
