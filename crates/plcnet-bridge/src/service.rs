//! The engineering collaborator boundary.
//!
//! The `EngineeringService` trait abstracts over the stateful engineering
//! tool that owns the project. Implementations are driven from a single
//! thread (see [`Session`](crate::session::Session)).

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;

/// A block inside a software container of the project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    pub container: String,
    pub name: String,
}

impl BlockRef {
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        BlockRef {
            container: container.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.name)
    }
}

/// A master copy inside a global library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MasterCopyRef {
    pub library: String,
    pub name: String,
}

/// What an import does when a block of the same name exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPolicy {
    /// Replace the existing block.
    Override,
    /// Refuse the import.
    Reject,
}

/// Operations consumed from the engineering tool.
pub trait EngineeringService: Send {
    /// Locate master copy `name` in `library`.
    fn find_master_copy(&mut self, library: &str, name: &str) -> ServiceResult<MasterCopyRef>;

    /// Instantiate a master copy into the block group of `container`.
    fn create_from_master_copy(&mut self, container: &str, copy: &MasterCopyRef) -> ServiceResult<BlockRef>;

    /// Set attribute `name` of `block`. Setting `Name` renames the block.
    fn set_attribute(&mut self, block: &BlockRef, name: &str, value: &str) -> ServiceResult<()>;

    fn compile(&mut self, block: &BlockRef) -> ServiceResult<()>;

    /// Export `block` as an interchange document to `path`.
    fn export(&mut self, block: &BlockRef, path: &Path) -> ServiceResult<()>;

    /// Import the interchange document at `path` into `container`.
    fn import_xml(&mut self, container: &str, path: &Path, policy: ImportPolicy) -> ServiceResult<BlockRef>;

    /// Create instance data block `name` of function block `instance_of`.
    fn create_instance_db(
        &mut self,
        container: &str,
        name: &str,
        number: u32,
        instance_of: &str,
    ) -> ServiceResult<BlockRef>;

    /// Locate an existing block of `container` by name.
    fn find_block(&mut self, container: &str, name: &str) -> ServiceResult<BlockRef>;
}
