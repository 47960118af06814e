//! Block data model and network assembly for PLC network generation.
//!
//! A [`BlockDescriptor`] collects the networks of one PLC block. Each network
//! is built by [`NetworkAssembler`] from an ordered list of [`CallSpec`]s,
//! which allocates every graphical element a uid unique within its
//! compile unit:
//!
//! ```text
//! uid 21..          calls (call uid, instance uid, pin uids)
//! next free         power rail -> first call `en`
//! then              call i-1 `eno` -> call i `en`
//! then              open stub -> multi-instance parameter pin
//! ```
//!
//! The typed [`ProjectConfig`] describes what should be generated.

pub mod assemble;
pub mod block;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod interface;
pub mod network;

// Re-exports for convenience.
pub use assemble::{CallSpec, NetworkAssembler, UidAllocator};
pub use block::{normalize_number, BlockKind, ProgrammingLanguage};
pub use config::{BlockConfig, BlockSource, DbConfig, DeviceConfig, LibraryConfig, ProjectConfig};
pub use descriptor::BlockDescriptor;
pub use error::{ConfigError, Result, ValidationError};
pub use interface::{Interface, InterfaceSection, Member, SectionName};
pub use network::{Call, CompileUnit, DbBinding, ParameterPin, Uid, Wire};
