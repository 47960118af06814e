//! Resolution of the calls inside a block's networks.
//!
//! Every call entry is turned into a [`CallSpec`]. Library calls are
//! materialized from their master copy, plc calls are looked up in the
//! project, and local calls are resolved recursively into child blocks that
//! must be generated before their caller. A call that cannot be resolved is
//! dropped from its network and reported; the remaining calls still stand.

use log::{debug, info, warn};
use plcnet_core::{BlockConfig, BlockKind, BlockSource, CallSpec, ConfigError, DbBinding, DbConfig, InterfaceSection};

use crate::bridge::ImportExportBridge;
use crate::checkpoint::{self, Checkpoint, Entry};
use crate::error::{Failure, GenerateError, Location};
use crate::service::BlockRef;

/// A code block whose networks hold only resolved calls.
#[derive(Debug)]
pub struct ResolvedBlock {
    pub config: BlockConfig,
    pub networks: Vec<Vec<CallSpec>>,
    /// Project-local callees, each generated before this block.
    pub children: Vec<ResolvedBlock>,
    /// Calls dropped while resolving this block's own networks.
    pub failures: Vec<GenerateError>,
    /// Whether the block is invoked from another block's network.
    pub called: bool,
}

impl ResolvedBlock {
    /// Dropped calls in this block and all of its children.
    pub fn failure_count(&self) -> usize {
        self.failures.len() + self.children.iter().map(ResolvedBlock::failure_count).sum::<usize>()
    }
}

/// Resolves calls of one device against the engineering session.
pub struct InstanceResolver<'a> {
    bridge: &'a ImportExportBridge,
    checkpoint: &'a mut Checkpoint,
    device: &'a str,
}

impl<'a> InstanceResolver<'a> {
    pub fn new(bridge: &'a ImportExportBridge, checkpoint: &'a mut Checkpoint, device: &'a str) -> Self {
        InstanceResolver {
            bridge,
            checkpoint,
            device,
        }
    }

    /// Resolve every network of `block`, depth first.
    pub fn resolve(&mut self, block: &BlockConfig) -> ResolvedBlock {
        self.resolve_block(block, false)
    }

    fn resolve_block(&mut self, block: &BlockConfig, called: bool) -> ResolvedBlock {
        let location = Location::block(self.device, &block.name);
        let mut resolved = ResolvedBlock {
            config: block.clone(),
            networks: Vec::with_capacity(block.network_sources.len()),
            children: Vec::new(),
            failures: Vec::new(),
            called,
        };

        for (index, network) in block.network_sources.iter().enumerate() {
            let mut specs = Vec::with_capacity(network.len());
            for call in network {
                match self.resolve_call(call) {
                    Ok((spec, child)) => {
                        specs.push(spec);
                        resolved.children.extend(child);
                    }
                    Err(failure) => {
                        let err = failure.at(location.network(index).call(&call.name));
                        warn!("dropping call: {err}");
                        resolved.failures.push(err);
                    }
                }
            }
            debug!("{location} network {index}: {} call(s) resolved", specs.len());
            resolved.networks.push(specs);
        }
        resolved
    }

    fn resolve_call(&mut self, call: &BlockConfig) -> Result<(CallSpec, Option<ResolvedBlock>), Failure> {
        if !call.kind.is_callable() {
            return Err(ConfigError::new(&call.name, format!("a {} cannot be called", call.kind)).into());
        }
        if call.kind == BlockKind::Function && matches!(call.db, Some(DbConfig::Single { .. } | DbConfig::Multi { .. }))
        {
            return Err(ConfigError::new(&call.name, "a function call takes no instance data").into());
        }

        let (callee, sections, child) = match &call.source {
            Some(BlockSource::Library { .. }) => {
                let sections = self.materialize(call, call_instance(call, &call.name))?;
                (call.name.clone(), sections, None)
            }
            Some(BlockSource::Plc { name }) => {
                let sections = self.materialize(call, call_instance(call, name))?;
                (name.clone(), sections, None)
            }
            None => {
                let child = self.resolve_block(call, true);
                (call.name.clone(), call.interface.clone(), Some(child))
            }
        };

        let binding = call.call_binding(&callee, sections);
        let spec = CallSpec::new(callee, call.kind, binding).with_number(call.number);
        Ok((spec, child))
    }

    /// Bring a sourced block into the device and return its interface.
    ///
    /// With `instance` set, an instance data block `(name, number)` of the
    /// materialized block is created as well. The outcome is cached in the
    /// checkpoint under the block's own name, so a resumed run skips the
    /// collaborator entirely.
    pub fn materialize(
        &mut self,
        block: &BlockConfig,
        instance: Option<(String, u32)>,
    ) -> Result<Vec<InterfaceSection>, Failure> {
        let key = checkpoint::key(self.device, &block.name);
        if let Some(sections) = self.checkpoint.sourced(&key) {
            info!("{}/{}: reusing materialized interface", self.device, block.name);
            return Ok(sections.to_vec());
        }

        let target = match &block.source {
            Some(BlockSource::Library { library, name }) => self.from_library(library, name, &block.name)?,
            Some(BlockSource::Plc { name }) => self
                .bridge
                .session()
                .find_block(self.device, name)
                .map_err(Failure::service("find block"))?,
            None => return Err(ConfigError::new(&block.name, "block has no source").into()),
        };

        if let Some((db_name, number)) = instance {
            self.bridge
                .session()
                .create_instance_db(self.device, &db_name, number, &target.name)
                .map_err(Failure::service("create instance db"))?;
            info!("created instance db {}/{db_name} of {}", self.device, target.name);
        }

        let sections = self.bridge.export_block(&target)?;
        self.checkpoint.record(
            key,
            Entry::Sourced {
                sections: sections.clone(),
            },
        )?;
        Ok(sections)
    }

    fn from_library(&self, library: &str, copy_name: &str, block_name: &str) -> Result<BlockRef, Failure> {
        let session = self.bridge.session();
        let copy = session
            .find_master_copy(library, copy_name)
            .map_err(Failure::service("find master copy"))?;
        let mut block = session
            .create_from_master_copy(self.device, &copy)
            .map_err(Failure::service("create from master copy"))?;
        if block.name != block_name {
            session
                .set_attribute(&block, "Name", block_name)
                .map_err(Failure::service("rename"))?;
            block.name = block_name.to_string();
        }
        session.compile(&block).map_err(Failure::service("compile"))?;
        info!("materialized {block} from {library}/{copy_name}");
        Ok(block)
    }
}

/// The instance data block a call needs created, if any.
fn call_instance(call: &BlockConfig, callee: &str) -> Option<(String, u32)> {
    match call.call_binding(callee, Vec::new()) {
        DbBinding::SingleInstance { name, .. } => Some((name, call.db_number())),
        _ => None,
    }
}
