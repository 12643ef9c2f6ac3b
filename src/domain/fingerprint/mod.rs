//! Exact-match keying for specifications
//!
//! A fingerprint is the SHA-256 of the normalized specification text.

mod computer;
mod hash;
mod normalizer;

pub use computer::FingerprintComputer;
pub use hash::{Fingerprint, FINGERPRINT_LEN};
pub use normalizer::NormalizationRule;
