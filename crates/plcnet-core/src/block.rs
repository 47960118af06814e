//! Block kinds, programming languages, and the block-number rule.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Smallest block number accepted besides `1`.
pub const MIN_FREE_NUMBER: u32 = 123;

/// Largest block number accepted by the engineering suite.
pub const MAX_NUMBER: u32 = 32767;

/// The closed set of block kinds that can be generated or called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Organization block (cyclic entry point).
    #[serde(rename = "OB")]
    OrganizationBlock,
    /// Function block (has instance data).
    #[serde(rename = "FB")]
    FunctionBlock,
    /// Function (no instance data).
    #[serde(rename = "FC")]
    Function,
    /// Standalone global data block.
    #[serde(rename = "GlobalDB", alias = "DB")]
    GlobalDataBlock,
    /// Instance data block of a function block.
    #[serde(rename = "InstanceDB")]
    InstanceDataBlock,
}

impl BlockKind {
    /// Short tag used in `SW.Blocks.<tag>` and `CallInfo/@BlockType`.
    pub fn tag(self) -> &'static str {
        match self {
            BlockKind::OrganizationBlock => "OB",
            BlockKind::FunctionBlock => "FB",
            BlockKind::Function => "FC",
            BlockKind::GlobalDataBlock => "GlobalDB",
            BlockKind::InstanceDataBlock => "InstanceDB",
        }
    }

    /// Code blocks carry networks; data blocks do not.
    pub fn is_code_block(self) -> bool {
        matches!(
            self,
            BlockKind::OrganizationBlock | BlockKind::FunctionBlock | BlockKind::Function
        )
    }

    /// Blocks that may appear as the callee of a `Call`.
    pub fn is_callable(self) -> bool {
        matches!(self, BlockKind::FunctionBlock | BlockKind::Function)
    }

    /// Whether the block owns a Static section able to hold multi-instances.
    pub fn has_static_section(self) -> bool {
        matches!(self, BlockKind::FunctionBlock)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for BlockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OB" => Ok(BlockKind::OrganizationBlock),
            "FB" => Ok(BlockKind::FunctionBlock),
            "FC" => Ok(BlockKind::Function),
            "GLOBALDB" | "DB" => Ok(BlockKind::GlobalDataBlock),
            "INSTANCEDB" => Ok(BlockKind::InstanceDataBlock),
            other => Err(format!("unknown block kind '{other}'")),
        }
    }
}

/// Programming language of a block or a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProgrammingLanguage {
    /// Ladder diagram.
    #[default]
    Lad,
    /// Function block diagram.
    Fbd,
    /// Structured control language.
    Scl,
    /// Statement list.
    Stl,
    /// Sequential function chart.
    Graph,
    /// Data block "language".
    Db,
}

impl ProgrammingLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgrammingLanguage::Lad => "LAD",
            ProgrammingLanguage::Fbd => "FBD",
            ProgrammingLanguage::Scl => "SCL",
            ProgrammingLanguage::Stl => "STL",
            ProgrammingLanguage::Graph => "GRAPH",
            ProgrammingLanguage::Db => "DB",
        }
    }
}

impl fmt::Display for ProgrammingLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgrammingLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LAD" => Ok(ProgrammingLanguage::Lad),
            "FBD" => Ok(ProgrammingLanguage::Fbd),
            "SCL" => Ok(ProgrammingLanguage::Scl),
            "STL" => Ok(ProgrammingLanguage::Stl),
            "GRAPH" => Ok(ProgrammingLanguage::Graph),
            "DB" => Ok(ProgrammingLanguage::Db),
            other => Err(format!("unknown programming language '{other}'")),
        }
    }
}

impl TryFrom<String> for ProgrammingLanguage {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProgrammingLanguage> for String {
    fn from(value: ProgrammingLanguage) -> Self {
        value.as_str().to_string()
    }
}

/// Whether `number` lies in `{1} ∪ [123, 32767]`.
pub fn is_valid_number(number: u32) -> bool {
    number == 1 || (MIN_FREE_NUMBER..=MAX_NUMBER).contains(&number)
}

/// Normalize a configured block number and reject values outside the legal range.
///
/// Organization blocks configured with `0` or a number in `2..=121` are placed
/// at `1`. Every other value, for any kind, must satisfy [`is_valid_number`].
pub fn normalize_number(kind: BlockKind, number: u32) -> Result<u32, ValidationError> {
    let normalized = match kind {
        BlockKind::OrganizationBlock if number == 0 || (2..MIN_FREE_NUMBER - 1).contains(&number) => 1,
        _ => number,
    };
    check_number(kind, normalized)?;
    Ok(normalized)
}

/// Reject a block number outside `{1} ∪ [123, 32767]`.
pub fn check_number(kind: BlockKind, number: u32) -> Result<(), ValidationError> {
    if is_valid_number(number) {
        Ok(())
    } else {
        Err(ValidationError::BlockNumberOutOfRange { kind, number })
    }
}
