//! Engineering-service boundary for PLC network generation.
//!
//! The engineering tool is reached through the [`EngineeringService`] trait
//! and always driven from one worker thread owned by a [`Session`]. On top
//! of that:
//!
//! - [`ImportExportBridge`] moves documents in and out through transient files,
//! - [`InstanceResolver`] turns configured calls into assembled call specs,
//! - [`Generator`] walks a project, generating callees before callers and
//!   recording progress in a [`Checkpoint`].
//!
//! [`LocalSession`] implements the service over a directory tree.

pub mod bridge;
pub mod checkpoint;
pub mod error;
pub mod generate;
pub mod local;
pub mod resolve;
pub mod service;
pub mod session;
pub mod transient;

pub use bridge::ImportExportBridge;
pub use checkpoint::Checkpoint;
pub use error::{Failure, GenerateError, Location, ServiceError, ServiceResult};
pub use generate::{build_descriptor, GenerationReport, Generator};
pub use local::LocalSession;
pub use resolve::{InstanceResolver, ResolvedBlock};
pub use service::{BlockRef, EngineeringService, ImportPolicy, MasterCopyRef};
pub use session::{LateOutcome, Session};
pub use transient::TransientFile;
