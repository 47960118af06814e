//! Collaborator and generation error types.

use std::fmt;
use std::io;
use std::time::Duration;

use plcnet_core::{ConfigError, ValidationError};
use plcnet_xml::XmlError;
use thiserror::Error;

/// Failures reported by (or on the way to) the engineering collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{what} '{name}' not found")]
    NotFound { what: String, name: String },

    #[error("compiling '{block}' failed: {detail}")]
    CompileFailed { block: String, detail: String },

    #[error("import into '{container}' rejected: {detail}")]
    ImportRejected { container: String, detail: String },

    #[error("unreadable document: {detail}")]
    InvalidDocument { detail: String },

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("engineering session is unavailable")]
    Unavailable,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for collaborator calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// What went wrong while generating, independent of where.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{operation} failed: {failure}")]
    ExternalService {
        operation: &'static str,
        failure: ServiceError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Encode(XmlError),
}

impl Failure {
    /// Wrap a collaborator failure of `operation`.
    pub fn service(operation: &'static str) -> impl FnOnce(ServiceError) -> Failure {
        move |failure| Failure::ExternalService { operation, failure }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Failure::ExternalService {
                failure: ServiceError::Timeout(_),
                ..
            }
        )
    }

    pub fn at(self, location: Location) -> GenerateError {
        GenerateError {
            location,
            failure: self,
        }
    }
}

impl From<XmlError> for Failure {
    fn from(err: XmlError) -> Self {
        match err {
            XmlError::Validation(e) => Failure::Validation(e),
            other => Failure::Encode(other),
        }
    }
}

/// Where a failure happened: block, then optionally network and call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub device: String,
    pub block: String,
    pub network: Option<usize>,
    pub call: Option<String>,
}

impl Location {
    pub fn block(device: &str, block: &str) -> Self {
        Location {
            device: device.to_string(),
            block: block.to_string(),
            network: None,
            call: None,
        }
    }

    pub fn network(&self, index: usize) -> Self {
        Location {
            network: Some(index),
            ..self.clone()
        }
    }

    pub fn call(&self, name: &str) -> Self {
        Location {
            call: Some(name.to_string()),
            ..self.clone()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.block)?;
        if let Some(network) = self.network {
            write!(f, " network {network}")?;
        }
        if let Some(call) = &self.call {
            write!(f, " call '{call}'")?;
        }
        Ok(())
    }
}

/// A failure attributed to the block, network, and call it belongs to.
#[derive(Debug, Error)]
#[error("{location}: {failure}")]
pub struct GenerateError {
    pub location: Location,
    #[source]
    pub failure: Failure,
}
