//! Error taxonomy of the tree layer.
//!
//! - `Structural` — rejected tree mutation (cycle, self-parent, locked instance).
//!   Checked before anything is mutated, so the caller may simply carry on.
//! - `Format` — the container does not have the shape we need (no model root,
//!   a record without class information, a malformed file). Fatal for the
//!   whole open/save.
//! - `InvalidReference` — a signed index points outside its table or into the
//!   wrong one. Fatal, never clamped.
//!
//! Whole-file operations return `anyhow::Result`; these errors travel inside
//! it and can be recovered with `err.downcast_ref::<MapError>()`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("structural error: {0}")]
    Structural(String),
    #[error("format error: {0}")]
    Format(String),
    #[error("invalid reference {value}: {reason}")]
    InvalidReference { value: i32, reason: String },
}

impl MapError {
    pub fn structural(msg: impl Into<String>) -> Self {
        MapError::Structural(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        MapError::Format(msg.into())
    }

    pub fn invalid_ref(value: i32, reason: impl Into<String>) -> Self {
        MapError::InvalidReference {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, MapError::Structural(_))
    }

    pub fn is_format(&self) -> bool {
        matches!(self, MapError::Format(_))
    }

    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, MapError::InvalidReference { .. })
    }
}

/// Result of a tree-level operation.
pub type TreeResult<T> = std::result::Result<T, MapError>;
