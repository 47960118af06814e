//! Validation and configuration error types.

use thiserror::Error;

use crate::block::BlockKind;
use crate::network::Uid;

/// Errors raised before any encoding or I/O. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("block number {number} is not valid for {kind}: must be 1 or within 123-32767")]
    BlockNumberOutOfRange { kind: BlockKind, number: u32 },

    #[error("call '{call}' targets a {kind} block, which cannot be called")]
    NotCallable { call: String, kind: BlockKind },

    #[error("call '{call}' uses a multi-instance binding, but a {parent} block has no Static section")]
    MultiInstanceWithoutStatic { call: String, parent: BlockKind },

    #[error("call '{call}' binds a {kind} block with instance data; only function blocks have instances")]
    InstanceOnFunction { call: String, kind: BlockKind },

    #[error("call '{call}' declares parameter '{parameter}' more than once")]
    DuplicateParameter { call: String, parameter: String },

    #[error("{what} name is empty")]
    EmptyName { what: String },

    #[error("uid {uid} is used more than once in compile unit {unit}")]
    DuplicateUid { unit: u32, uid: Uid },

    #[error("call uids in compile unit {unit} must start at 21 and increase (found {uid})")]
    CallOrder { unit: u32, uid: Uid },

    #[error("compile unit id {id} is used more than once")]
    DuplicateUnitId { id: u32 },

    #[error("a {kind} block cannot carry networks")]
    NetworksOnDataBlock { kind: BlockKind },

    #[error("member '{name}' is declared more than once in section {section}")]
    DuplicateMember { section: String, name: String },
}

/// A required field is missing or inconsistent in a configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {detail}")]
pub struct ConfigError {
    /// Dotted path to the offending entry, e.g. `PLC_1.Main.network[0].Reset_1`.
    pub path: String,
    pub detail: String,
}

impl ConfigError {
    pub fn new(path: impl Into<String>, detail: impl Into<String>) -> Self {
        ConfigError {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// Result alias for model-level validation.
pub type Result<T> = std::result::Result<T, ValidationError>;
