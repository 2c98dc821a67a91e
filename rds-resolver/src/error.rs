//! Typed resolver errors (spec §7): transient remote failures are the only
//! ones that ever reach the caller — local-file and cache problems are
//! absorbed internally and fall back to the remote path.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("overpass endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("overpass request timed out after {0:?}")]
    Timeout(Duration),

    #[error("overpass network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("overpass response could not be parsed: {0}")]
    Parse(String),
}
