//! Block generation driver.
//!
//! Walks the program blocks of every device, resolves their calls, encodes
//! the resulting descriptors, and imports them. Callees are generated before
//! their callers. A failing block is reported and the next one continues.

use std::collections::HashSet;
use std::fmt;

use log::{debug, error, info, warn};
use plcnet_core::{
    BlockConfig, BlockDescriptor, BlockKind, CallSpec, ConfigError, DbConfig, DeviceConfig, ProjectConfig,
};
use plcnet_xml::{Document, XmlEncoder};

use crate::bridge::ImportExportBridge;
use crate::checkpoint::{self, Checkpoint, Entry};
use crate::error::{Failure, GenerateError, Location};
use crate::resolve::{InstanceResolver, ResolvedBlock};
use crate::session::LateOutcome;

/// Outcome of one generation run.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Blocks imported in this run.
    pub generated: Vec<Location>,
    /// Blocks left untouched because the checkpoint already had them.
    pub resumed: Vec<Location>,
    /// Blocks that could not be generated.
    pub failed: Vec<GenerateError>,
    /// Calls dropped from otherwise generated networks.
    pub call_failures: Vec<GenerateError>,
    /// Collaborator calls that completed after they were reported as timed out.
    pub late: Vec<LateOutcome>,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether every block and every call made it through.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.call_failures.is_empty() && self.late.is_empty()
    }
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} generated, {} resumed, {} failed, {} call(s) dropped",
            self.generated.len(),
            self.resumed.len(),
            self.failed.len(),
            self.call_failures.len()
        )?;
        for err in self.failed.iter().chain(&self.call_failures) {
            write!(f, "\n  {err}")?;
        }
        for outcome in &self.late {
            write!(f, "\n  late: {outcome}")?;
        }
        Ok(())
    }
}

enum Outcome {
    Generated,
    Resumed,
    /// Already handled earlier in this run.
    Repeated,
}

/// Turns a project configuration into imported blocks.
pub struct Generator<'a> {
    bridge: &'a ImportExportBridge,
    encoder: XmlEncoder<'a>,
    checkpoint: Checkpoint,
    done: HashSet<String>,
}

impl<'a> Generator<'a> {
    pub fn new(bridge: &'a ImportExportBridge, encoder: XmlEncoder<'a>, checkpoint: Checkpoint) -> Self {
        Generator {
            bridge,
            encoder,
            checkpoint,
            done: HashSet::new(),
        }
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn into_checkpoint(self) -> Checkpoint {
        self.checkpoint
    }

    pub fn generate_project(&mut self, project: &ProjectConfig) -> GenerationReport {
        info!("generating project '{}'", project.name);
        let mut report = GenerationReport::default();
        for device in &project.devices {
            self.generate_device(device, &mut report);
        }
        let session = self.bridge.session();
        if let Err(err) = session.settle() {
            warn!("engineering session still busy at the end of the run: {err}");
        }
        report.late = session.late_outcomes();
        info!("project '{}': {report}", project.name);
        report
    }

    pub fn generate_device(&mut self, device: &DeviceConfig, report: &mut GenerationReport) {
        info!(
            "device '{}': {} program block(s)",
            device.name,
            device.program_blocks.len()
        );
        for block in &device.program_blocks {
            self.generate_block(&device.name, block, report);
        }
    }

    /// Generate one top-level program block of `device`.
    pub fn generate_block(&mut self, device: &str, block: &BlockConfig, report: &mut GenerationReport) {
        if block.source.is_none() && block.kind.is_code_block() {
            let resolved = InstanceResolver::new(self.bridge, &mut self.checkpoint, device).resolve(block);
            self.emit(device, resolved, report);
            return;
        }

        let location = Location::block(device, &block.name);
        let outcome = if block.source.is_some() {
            self.materialize(device, block)
        } else if block.kind == BlockKind::InstanceDataBlock {
            self.instance_db(device, block)
        } else {
            self.global_db(device, block)
        };
        record(report, location, outcome);
    }

    fn emit(&mut self, device: &str, resolved: ResolvedBlock, report: &mut GenerationReport) {
        let ResolvedBlock {
            config,
            networks,
            children,
            failures,
            called,
        } = resolved;
        let key = checkpoint::key(device, &config.name);
        if self.done.contains(&key) {
            debug!("{device}/{}: already handled in this run", config.name);
            return;
        }
        for child in children {
            self.emit(device, child, report);
        }
        report.call_failures.extend(failures);

        let location = Location::block(device, &config.name);
        let outcome = self.code_block(device, &config, &networks, called);
        record(report, location, outcome);
    }

    fn code_block(
        &mut self,
        device: &str,
        config: &BlockConfig,
        networks: &[Vec<CallSpec>],
        called: bool,
    ) -> Result<Outcome, GenerateError> {
        let location = Location::block(device, &config.name);
        let key = checkpoint::key(device, &config.name);
        if !self.done.insert(key.clone()) {
            debug!("{location}: already generated in this run");
            return Ok(Outcome::Repeated);
        }

        let descriptor = build_descriptor(config, networks, &location)?;
        let document = self.encode(&descriptor, &location)?;
        let digest = checkpoint::digest(&document);
        if self.checkpoint.is_imported(&key, &digest) {
            info!("{location}: unchanged since the last run");
            return Ok(Outcome::Resumed);
        }

        let at = |failure: Failure| failure.at(location.clone());
        self.bridge.import_block(&document, device).map_err(at)?;
        self.backing_db(device, config, called).map_err(at)?;
        self.checkpoint
            .record(key, Entry::Imported { digest })
            .map_err(|e| at(e.into()))?;
        info!("{location}: generated with {} network(s)", descriptor.units.len());
        Ok(Outcome::Generated)
    }

    /// Create the data block an imported block is bound to.
    ///
    /// Blocks invoked from a network get the same default backing their call
    /// used; top-level blocks only get what they declare.
    fn backing_db(&self, device: &str, config: &BlockConfig, called: bool) -> Result<(), Failure> {
        let db_name = |name: &Option<String>| name.clone().unwrap_or_else(|| config.default_db_name());
        match &config.db {
            Some(DbConfig::Single { name, number, .. }) => self.create_instance(device, &db_name(name), *number, config),
            None if called && config.kind == BlockKind::FunctionBlock => {
                self.create_instance(device, &config.default_db_name(), config.db_number(), config)
            }
            Some(DbConfig::Global { name, number }) if config.kind == BlockKind::FunctionBlock => {
                let location = Location::block(device, &config.name);
                let db = BlockDescriptor::global_db(db_name(name), *number)?;
                let document = self.encode(&db, &location).map_err(|e| e.failure)?;
                self.bridge.import_block(&document, device)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn create_instance(&self, device: &str, name: &str, number: u32, config: &BlockConfig) -> Result<(), Failure> {
        self.bridge
            .session()
            .create_instance_db(device, name, number, &config.name)
            .map_err(Failure::service("create instance db"))?;
        info!("created instance db {device}/{name} of {}", config.name);
        Ok(())
    }

    fn materialize(&mut self, device: &str, block: &BlockConfig) -> Result<Outcome, GenerateError> {
        let location = Location::block(device, &block.name);
        let key = checkpoint::key(device, &block.name);
        if !self.done.insert(key.clone()) {
            return Ok(Outcome::Repeated);
        }
        if self.checkpoint.sourced(&key).is_some() {
            info!("{location}: already materialized");
            return Ok(Outcome::Resumed);
        }
        let instance = match &block.db {
            Some(DbConfig::Single { name, number, .. }) => {
                Some((name.clone().unwrap_or_else(|| block.default_db_name()), *number))
            }
            _ => None,
        };
        InstanceResolver::new(self.bridge, &mut self.checkpoint, device)
            .materialize(block, instance)
            .map_err(|failure| failure.at(location))?;
        Ok(Outcome::Generated)
    }

    fn global_db(&mut self, device: &str, block: &BlockConfig) -> Result<Outcome, GenerateError> {
        let location = Location::block(device, &block.name);
        let at = |failure: Failure| failure.at(location.clone());
        let mut db = BlockDescriptor::global_db(&block.name, block.number).map_err(|e| at(e.into()))?;
        db.declare(&block.interface).map_err(|e| at(e.into()))?;
        self.import_tracked(device, &db, &location)
    }

    fn instance_db(&mut self, device: &str, block: &BlockConfig) -> Result<Outcome, GenerateError> {
        let location = Location::block(device, &block.name);
        let Some(DbConfig::Single {
            instance_of_name: Some(owner),
            ..
        }) = &block.db
        else {
            let detail = "instance data block needs db.instance_of_name";
            return Err(Failure::from(ConfigError::new(&block.name, detail)).at(location));
        };
        self.bridge
            .session()
            .create_instance_db(device, &block.name, block.number, owner)
            .map_err(|e| Failure::service("create instance db")(e).at(location.clone()))?;
        info!("{location}: instance db of {owner} created");
        Ok(Outcome::Generated)
    }

    /// Encode, skip if unchanged, import, and record a standalone block.
    fn import_tracked(
        &mut self,
        device: &str,
        block: &BlockDescriptor,
        location: &Location,
    ) -> Result<Outcome, GenerateError> {
        let key = checkpoint::key(device, &block.name);
        if !self.done.insert(key.clone()) {
            return Ok(Outcome::Repeated);
        }
        let document = self.encode(block, location)?;
        let digest = checkpoint::digest(&document);
        if self.checkpoint.is_imported(&key, &digest) {
            info!("{location}: unchanged since the last run");
            return Ok(Outcome::Resumed);
        }
        let at = |failure: Failure| failure.at(location.clone());
        self.bridge.import_block(&document, device).map_err(at)?;
        self.checkpoint
            .record(key, Entry::Imported { digest })
            .map_err(|e| at(e.into()))?;
        Ok(Outcome::Generated)
    }

    fn encode(&self, block: &BlockDescriptor, location: &Location) -> Result<Document, GenerateError> {
        self.encoder
            .encode(block)
            .map_err(|e| Failure::from(e).at(location.clone()))
    }
}

/// Build the descriptor of a code block from its resolved networks.
///
/// Networks keep their configured order even when calls were dropped, so an
/// empty network still occupies its compile unit.
pub fn build_descriptor(
    config: &BlockConfig,
    networks: &[Vec<CallSpec>],
    location: &Location,
) -> Result<BlockDescriptor, GenerateError> {
    let at = |failure: Failure| failure.at(location.clone());
    let mut block = BlockDescriptor::new(config.kind, &config.name, config.number, config.programming_language)
        .map_err(|e| at(e.into()))?;
    if let Some(title) = &config.title {
        block = block.with_title(title);
    }
    if let Some(secondary_type) = &config.secondary_type {
        block = block.with_secondary_type(secondary_type);
    }
    block.declare(&config.interface).map_err(|e| at(e.into()))?;
    for (index, specs) in networks.iter().enumerate() {
        block
            .push_network(specs)
            .map_err(|e| Failure::from(e).at(location.network(index)))?;
    }
    Ok(block)
}

fn record(report: &mut GenerationReport, location: Location, outcome: Result<Outcome, GenerateError>) {
    match outcome {
        Ok(Outcome::Generated) => report.generated.push(location),
        Ok(Outcome::Resumed) => report.resumed.push(location),
        Ok(Outcome::Repeated) => {}
        Err(err) => {
            error!("{err}");
            report.failed.push(err);
        }
    }
}
