//! Typed error type for the mapper crate.
//!
//! Extraction never fails by design (§4.3) — this exists for the
//! `text_content`/normalization helpers that do touch fallible JSON parsing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("malformed node output: {0}")]
    Malformed(String),
}
