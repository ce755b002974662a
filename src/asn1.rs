//! Minimal DER encoder and reader
//!
//! Only the structures needed for CMS SignedData, OCSP requests, CRL URL
//! extraction, and RFC 3161 are covered. This is not a general ASN.1
//! library; encoding is byte-exact DER (definite lengths only).

use crate::error::{Error, Result};

// ============================================================================
// Tags
// ============================================================================

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_BIT_STRING: u8 = 0x03;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_UTF8_STRING: u8 = 0x0C;
pub const TAG_IA5_STRING: u8 = 0x16;
pub const TAG_UTC_TIME: u8 = 0x17;
pub const TAG_GENERALIZED_TIME: u8 = 0x18;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

// ============================================================================
// Object identifiers (body bytes, without tag/length)
// ============================================================================

/// 1.2.840.113549.1.7.1 (id-data)
pub const OID_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x01];
/// 1.2.840.113549.1.7.2 (id-signedData)
pub const OID_SIGNED_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02];
/// 1.2.840.113549.1.9.3 (id-contentType)
pub const OID_CONTENT_TYPE: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x03];
/// 1.2.840.113549.1.9.4 (id-messageDigest)
pub const OID_MESSAGE_DIGEST: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x04];
/// 1.2.840.113549.1.9.5 (id-signingTime)
pub const OID_SIGNING_TIME: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x05];
/// 1.2.840.113549.1.9.16.2.14 (id-aa-signatureTimeStampToken)
pub const OID_TIMESTAMP_TOKEN: &[u8] = &[
    0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x10, 0x02, 0x0E,
];
/// 1.3.14.3.2.26 (sha1)
pub const OID_SHA1: &[u8] = &[0x2B, 0x0E, 0x03, 0x02, 0x1A];
/// 2.16.840.1.101.3.4.2.1 (sha256)
pub const OID_SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
/// 2.16.840.1.101.3.4.2.2 (sha384)
pub const OID_SHA384: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02];
/// 2.16.840.1.101.3.4.2.3 (sha512)
pub const OID_SHA512: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03];
/// 1.2.840.113549.1.1.1 (rsaEncryption)
pub const OID_RSA_ENCRYPTION: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01];
/// 1.2.840.113549.1.1.11 (sha256WithRSAEncryption)
pub const OID_SHA256_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B];
/// 1.2.840.113549.1.1.12 (sha384WithRSAEncryption)
pub const OID_SHA384_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0C];
/// 1.2.840.113549.1.1.13 (sha512WithRSAEncryption)
pub const OID_SHA512_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0D];
/// 1.2.840.10045.2.1 (ecPublicKey)
pub const OID_EC_PUBLIC_KEY: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x02, 0x01];
/// 1.2.840.10045.4.3.2 (ecdsa-with-SHA256)
pub const OID_ECDSA_SHA256: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x02];
/// 1.2.840.10045.4.3.3 (ecdsa-with-SHA384)
pub const OID_ECDSA_SHA384: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x03];
/// 1.2.840.10045.4.3.4 (ecdsa-with-SHA512)
pub const OID_ECDSA_SHA512: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x04];
/// 1.3.6.1.5.5.7.1.1 (id-pe-authorityInfoAccess)
pub const OID_AUTHORITY_INFO_ACCESS: &[u8] = &[0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x01, 0x01];
/// 1.3.6.1.5.5.7.48.1 (id-ad-ocsp)
pub const OID_AD_OCSP: &[u8] = &[0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x01];
/// 2.5.29.31 (id-ce-cRLDistributionPoints)
pub const OID_CRL_DISTRIBUTION_POINTS: &[u8] = &[0x55, 0x1D, 0x1F];

// ============================================================================
// Encoding
// ============================================================================

/// Encode a DER definite length
pub fn encode_length(len: usize) -> Vec<u8> {
    if len < 128 {
        vec![len as u8]
    } else if len < 256 {
        vec![0x81, len as u8]
    } else if len < 65536 {
        vec![0x82, (len >> 8) as u8, len as u8]
    } else {
        vec![0x83, (len >> 16) as u8, (len >> 8) as u8, len as u8]
    }
}

/// Encode one tag-length-value element
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 5);
    out.push(tag);
    out.extend(encode_length(content.len()));
    out.extend_from_slice(content);
    out
}

/// SEQUENCE of pre-encoded elements
pub fn sequence(items: &[&[u8]]) -> Vec<u8> {
    let content: Vec<u8> = items.iter().flat_map(|i| i.iter().copied()).collect();
    tlv(TAG_SEQUENCE, &content)
}

/// SET of pre-encoded elements
pub fn set(items: &[&[u8]]) -> Vec<u8> {
    let content: Vec<u8> = items.iter().flat_map(|i| i.iter().copied()).collect();
    tlv(TAG_SET, &content)
}

/// OBJECT IDENTIFIER from pre-encoded body bytes
pub fn oid(body: &[u8]) -> Vec<u8> {
    tlv(TAG_OID, body)
}

/// INTEGER from big-endian magnitude bytes. A leading 0x00 is inserted when
/// the high bit is set so the value stays non-negative.
pub fn integer(bytes: &[u8]) -> Vec<u8> {
    let mut body = bytes;
    while body.len() > 1 && body[0] == 0 && body[1] & 0x80 == 0 {
        body = &body[1..];
    }
    if body.is_empty() {
        return tlv(TAG_INTEGER, &[0]);
    }
    if body[0] & 0x80 != 0 {
        let mut padded = Vec::with_capacity(body.len() + 1);
        padded.push(0);
        padded.extend_from_slice(body);
        tlv(TAG_INTEGER, &padded)
    } else {
        tlv(TAG_INTEGER, body)
    }
}

/// Small non-negative INTEGER
pub fn integer_u64(value: u64) -> Vec<u8> {
    integer(&value.to_be_bytes())
}

/// OCTET STRING
pub fn octet_string(content: &[u8]) -> Vec<u8> {
    tlv(TAG_OCTET_STRING, content)
}

/// BIT STRING with zero unused bits
pub fn bit_string(content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 1);
    body.push(0);
    body.extend_from_slice(content);
    tlv(TAG_BIT_STRING, &body)
}

/// BOOLEAN
pub fn boolean(value: bool) -> Vec<u8> {
    tlv(TAG_BOOLEAN, &[if value { 0xFF } else { 0x00 }])
}

/// NULL
pub fn null() -> Vec<u8> {
    vec![TAG_NULL, 0x00]
}

/// UTF8String
pub fn utf8_string(s: &str) -> Vec<u8> {
    tlv(TAG_UTF8_STRING, s.as_bytes())
}

/// UTCTime from a preformatted `YYMMDDHHMMSSZ` string
pub fn utc_time(s: &str) -> Vec<u8> {
    tlv(TAG_UTC_TIME, s.as_bytes())
}

/// Context-specific constructed tag `[n]` wrapping raw content
pub fn context(n: u8, content: &[u8]) -> Vec<u8> {
    tlv(0xA0 | n, content)
}

/// Context-specific primitive tag `[n]` (e.g. 0x86 for IA5String URIs)
pub fn context_primitive(n: u8, content: &[u8]) -> Vec<u8> {
    tlv(0x80 | n, content)
}

/// AlgorithmIdentifier with a NULL parameter
pub fn algorithm_identifier(oid_body: &[u8]) -> Vec<u8> {
    sequence(&[&oid(oid_body), &null()])
}

/// AlgorithmIdentifier with the parameter omitted (ECDSA convention)
pub fn algorithm_identifier_no_params(oid_body: &[u8]) -> Vec<u8> {
    sequence(&[&oid(oid_body)])
}

// ============================================================================
// Reading
// ============================================================================

/// Cursor over DER bytes. Reads headers and content slices without copying;
/// callers compose `nested()` readers to walk into constructed elements.
#[derive(Debug, Clone)]
pub struct DerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Tag byte of the next element, without consuming it
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn read_header(&mut self) -> Result<(u8, usize)> {
        let tag = *self
            .data
            .get(self.pos)
            .ok_or_else(|| Error::Asn1("truncated: expected tag".into()))?;
        self.pos += 1;
        let first = *self
            .data
            .get(self.pos)
            .ok_or_else(|| Error::Asn1("truncated: expected length".into()))?;
        self.pos += 1;
        let len = if first < 0x80 {
            first as usize
        } else {
            let n = (first & 0x7F) as usize;
            if n == 0 || n > 4 {
                return Err(Error::Asn1(format!(
                    "unsupported length form 0x{first:02X}"
                )));
            }
            let mut len = 0usize;
            for _ in 0..n {
                let b = *self
                    .data
                    .get(self.pos)
                    .ok_or_else(|| Error::Asn1("truncated: long length".into()))?;
                self.pos += 1;
                len = (len << 8) | b as usize;
            }
            len
        };
        if self.pos + len > self.data.len() {
            return Err(Error::Asn1(format!(
                "truncated: element of {len} bytes exceeds buffer"
            )));
        }
        Ok((tag, len))
    }

    /// Read the next element of the expected tag and return its content
    pub fn read(&mut self, expected_tag: u8) -> Result<&'a [u8]> {
        let (tag, content) = self.read_any()?;
        if tag != expected_tag {
            return Err(Error::Asn1(format!(
                "expected tag 0x{expected_tag:02X}, found 0x{tag:02X}"
            )));
        }
        Ok(content)
    }

    /// Read the next element, whatever its tag; returns (tag, content)
    pub fn read_any(&mut self) -> Result<(u8, &'a [u8])> {
        let (tag, len) = self.read_header()?;
        let content = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok((tag, content))
    }

    /// Read the next element and return it verbatim, header included
    pub fn read_tlv(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let (_, len) = self.read_header()?;
        let end = self.pos + len;
        self.pos = end;
        Ok(&self.data[start..end])
    }

    /// Skip the next element entirely
    pub fn skip(&mut self) -> Result<()> {
        self.read_tlv().map(|_| ())
    }

    /// Reader over the content of the next element (must match `tag`)
    pub fn nested(&mut self, tag: u8) -> Result<DerReader<'a>> {
        Ok(DerReader::new(self.read(tag)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_length() {
        assert_eq!(encode_length(0), vec![0x00]);
        assert_eq!(encode_length(127), vec![0x7F]);
        assert_eq!(encode_length(128), vec![0x81, 0x80]);
        assert_eq!(encode_length(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(encode_length(70000), vec![0x83, 0x01, 0x11, 0x70]);
    }

    #[test]
    fn test_integer_high_bit_padded() {
        assert_eq!(integer(&[0x7F]), vec![0x02, 0x01, 0x7F]);
        assert_eq!(integer(&[0x80]), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(integer(&[]), vec![0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_integer_strips_redundant_zeros() {
        assert_eq!(integer(&[0x00, 0x00, 0x01]), vec![0x02, 0x01, 0x01]);
        // A zero needed for sign stays
        assert_eq!(integer(&[0x00, 0xFF]), vec![0x02, 0x02, 0x00, 0xFF]);
    }

    #[test]
    fn test_sequence_wraps_items() {
        let seq = sequence(&[&integer(&[1]), &boolean(true)]);
        assert_eq!(seq[0], TAG_SEQUENCE);
        assert_eq!(seq[1] as usize, seq.len() - 2);
    }

    #[test]
    fn test_bit_string_unused_bits_prefix() {
        let bs = bit_string(&[0xAB]);
        assert_eq!(bs, vec![0x03, 0x02, 0x00, 0xAB]);
    }

    #[test]
    fn test_reader_roundtrip() {
        let der = sequence(&[&oid(OID_SHA256), &octet_string(b"hash")]);
        let mut outer = DerReader::new(&der);
        let mut inner = outer.nested(TAG_SEQUENCE).unwrap();
        assert!(outer.is_empty());
        assert_eq!(inner.read(TAG_OID).unwrap(), OID_SHA256);
        assert_eq!(inner.read(TAG_OCTET_STRING).unwrap(), b"hash");
        assert!(inner.is_empty());
    }

    #[test]
    fn test_reader_read_tlv_verbatim() {
        let int = integer(&[0x42]);
        let der = sequence(&[&int]);
        let mut r = DerReader::new(&der);
        let mut inner = r.nested(TAG_SEQUENCE).unwrap();
        assert_eq!(inner.read_tlv().unwrap(), int.as_slice());
    }

    #[test]
    fn test_reader_tag_mismatch() {
        let der = integer(&[1]);
        let mut r = DerReader::new(&der);
        assert!(r.read(TAG_OCTET_STRING).is_err());
    }

    #[test]
    fn test_reader_truncated() {
        // Claims 10 content bytes, provides 1
        let bad = [0x30, 0x0A, 0x00];
        let mut r = DerReader::new(&bad);
        assert!(r.read(TAG_SEQUENCE).is_err());
    }

    #[test]
    fn test_reader_long_length() {
        let content = vec![0xAA; 300];
        let der = octet_string(&content);
        let mut r = DerReader::new(&der);
        assert_eq!(r.read(TAG_OCTET_STRING).unwrap(), content.as_slice());
    }

    #[test]
    fn test_context_tags() {
        assert_eq!(context(0, &[0x01])[0], 0xA0);
        assert_eq!(context_primitive(6, b"http://x")[0], 0x86);
    }
}
