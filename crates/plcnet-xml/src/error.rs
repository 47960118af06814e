//! Encoder, template, and document parsing errors.

use std::path::PathBuf;

use plcnet_core::ValidationError;
use thiserror::Error;

/// Errors raised while rendering or reading vendor XML.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The block violates a model invariant; nothing was rendered.
    #[error("invalid block: {0}")]
    Validation(#[from] ValidationError),

    #[error("unknown template '{name}'")]
    UnknownTemplate { name: String },

    #[error("template '{template}' has no value for placeholder '{placeholder}'")]
    MissingPlaceholder { template: String, placeholder: String },

    #[error("template '{template}' uses unknown placeholder '{placeholder}'")]
    UnknownPlaceholder { template: String, placeholder: String },

    #[error("template '{template}' is malformed: {detail}")]
    MalformedTemplate { template: String, detail: String },

    #[error("malformed document: {detail}")]
    Parse { detail: String },

    #[error("template directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl XmlError {
    pub(crate) fn parse(detail: impl ToString) -> Self {
        XmlError::Parse {
            detail: detail.to_string(),
        }
    }
}

/// Result type alias for XML operations.
pub type Result<T> = std::result::Result<T, XmlError>;
