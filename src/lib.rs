//! # pdfseal
//!
//! Incremental PDF digital signing in pure Rust: CMS/PKCS#7 detached
//! signatures (`adbe.pkcs7.detached`), RFC 3161 timestamps, and long-term
//! validation material (DSS/VRI), all written as append-only incremental
//! updates so existing signatures survive every operation.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdfseal::{KeyringProvider, PdfSigner, SignatureRequest};
//!
//! # fn main() -> pdfseal::Result<()> {
//! let cert_pem = std::fs::read_to_string("signer.crt")?;
//! let key_pem = std::fs::read_to_string("signer.key")?;
//! let provider = KeyringProvider::from_pem(&cert_pem, &key_pem)?;
//! let signer = PdfSigner::new(&provider);
//! let request = SignatureRequest::new()
//!     .with_reason("Approved")
//!     .with_signer_name("Jane Doe");
//! signer.sign_file("contract.pdf", "contract-signed.pdf", &request)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Design
//!
//! The document is never re-serialized. [`StructuralSnapshot`] reads just
//! enough structure to append safely, [`IncrementalUpdateWriter`] emits new
//! objects behind the original bytes, and the signature is spliced into a
//! fixed-width placeholder so the signed digest matches the final file.

pub mod asn1;
pub mod cms;
pub mod crl;
pub mod dss;
pub mod error;
pub mod object;
pub mod ocsp;
pub mod provider;
pub mod signer;
pub mod structure;
pub mod timestamp;
pub mod update;
pub mod x509;

#[cfg(test)]
mod testcert;
#[cfg(test)]
mod testhttp;
#[cfg(test)]
mod testpdf;

pub use cms::CmsSignedDataBuilder;
pub use crl::CrlFetcher;
pub use dss::DssBuilder;
pub use error::{Error, Result, StructureError};
pub use object::{IndirectObject, ObjectRef, PdfDict, PdfValue};
pub use ocsp::OcspClient;
pub use provider::{HashAlgorithm, KeyringProvider, SigningProvider};
pub use signer::{PdfSigner, SignatureAppearance, SignatureRequest};
pub use structure::{SignatureField, StructuralSnapshot};
pub use timestamp::{TimestampClient, TsaConfig};
pub use update::{IncrementalUpdateWriter, ObjectNumberAllocator};
pub use x509::{pem_chain_to_der, pem_to_der, SignerCertificate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
