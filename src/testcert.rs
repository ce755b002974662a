//! Synthetic certificate fixtures for unit tests, assembled with the
//! crate's own DER encoder. Signatures on these certificates are garbage;
//! only the fields the signing core reads are meaningful.

use crate::asn1::{
    algorithm_identifier, bit_string, context, integer, oid, sequence, set, utc_time,
    utf8_string, OID_RSA_ENCRYPTION, OID_SHA256_RSA,
};

fn name(cn: &str) -> Vec<u8> {
    sequence(&[&set(&[&sequence(&[
        &oid(&[0x55, 0x04, 0x03]),
        &utf8_string(cn),
    ])])])
}

/// Certificate with the given serial, subject CN, and extensions block
pub(crate) fn cert_with_extensions(
    serial: &[u8],
    cn: &str,
    extensions: Option<Vec<u8>>,
) -> Vec<u8> {
    let validity = sequence(&[&utc_time("240101000000Z"), &utc_time("340101000000Z")]);
    let spki = sequence(&[
        &algorithm_identifier(OID_RSA_ENCRYPTION),
        &bit_string(&[0x03, 0x01, 0x00, 0x01]),
    ]);
    let mut items: Vec<Vec<u8>> = vec![
        context(0, &integer(&[2])),
        integer(serial),
        algorithm_identifier(OID_SHA256_RSA),
        name("Fixture CA"),
        validity,
        name(cn),
        spki,
    ];
    if let Some(exts) = extensions {
        items.push(context(3, &exts));
    }
    let refs: Vec<&[u8]> = items.iter().map(|v| v.as_slice()).collect();
    let tbs = sequence(&refs);
    sequence(&[
        &tbs,
        &algorithm_identifier(OID_SHA256_RSA),
        &bit_string(&[0xAA; 8]),
    ])
}

/// Plain certificate with no extensions
pub(crate) fn simple_cert(serial: &[u8], cn: &str) -> Vec<u8> {
    cert_with_extensions(serial, cn, None)
}
