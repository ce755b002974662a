//! Error types for PDF signing operations

/// Result type for signing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structural problems in the host document. These are always fatal for the
/// parse call that raised them; no partial snapshot is produced.
#[derive(Debug, thiserror::Error)]
pub enum StructureError {
    /// No `startxref` token before the final `%%EOF`
    #[error("no startxref found before %%EOF")]
    MissingStartXref,
    /// Trailer has no /Root, or /Root does not resolve to a Catalog
    #[error("trailer /Root missing or does not resolve to a Catalog")]
    MissingRoot,
    /// Malformed cross-reference section
    #[error("malformed xref section: {0}")]
    MalformedXref(String),
    /// Header is not a PDF header
    #[error("not a PDF: missing %PDF- header")]
    NotAPdf,
}

/// Error types for signing, revocation, and timestamping
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Host document cannot be parsed well enough to append to
    #[error("document structure: {0}")]
    Structure(#[from] StructureError),

    /// Requested signature field is missing or already signed
    #[error("signature field: {0}")]
    Field(String),

    /// Key or certificate failure, or the signing primitive itself failed
    #[error("crypto: {0}")]
    Crypto(String),

    /// DER encode/decode failure
    #[error("ASN.1: {0}")]
    Asn1(String),

    /// The encoded signature did not fit the reserved placeholder
    #[error("signature of {needed} hex chars exceeds the {available}-char placeholder")]
    SignatureTooLarge { needed: usize, available: usize },

    /// The TSA explicitly refused the timestamp request. Distinct from
    /// transport failures: a rejection must never be silently retried or
    /// mistaken for a network timeout.
    #[error("TSA rejected request: status {status}, {message}")]
    TimestampRejected { status: u8, message: String },

    /// HTTP transport failure (OCSP/CRL/TSA round trips)
    #[error("http: {0}")]
    Http(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
