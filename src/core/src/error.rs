//! Error types for hat identifier construction and parsing

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the hat identifier codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Top-level domains start at 1; domain 0 is never a valid tree
    #[error("invalid top hat domain: {0}")]
    InvalidDomain(u32),

    /// Child indices occupy one level segment and must be non-zero
    #[error("invalid child index: {0}")]
    InvalidChildIndex(u8),

    /// The admin already sits at the deepest level
    #[error("depth exceeded: level {level} has no room for a child")]
    DepthExceeded { level: usize },

    /// A non-zero segment sits below a zero segment
    #[error("non-contiguous hat id: segment {segment} set below an empty level")]
    NonContiguous { segment: usize },

    /// Textual form could not be decoded
    #[error("parse error: {0}")]
    Parse(String),
}

impl CoreError {
    /// Create a parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        CoreError::Parse(msg.into())
    }
}
