//! Typed project configuration.
//!
//! A project lists libraries and devices; every device carries program blocks
//! whose networks are ordered lists of nested block configurations. The model
//! is validated once, right after loading.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::block::{BlockKind, ProgrammingLanguage};
use crate::error::ConfigError;
use crate::interface::InterfaceSection;
use crate::network::DbBinding;

/// Number given to instance data blocks when none is configured.
pub const DEFAULT_INSTANCE_DB_NUMBER: u32 = 1;

/// Root of a project description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub libraries: Vec<LibraryConfig>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// A global library holding master copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub name: String,
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default = "default_read_only")]
    pub read_only: bool,
}

fn default_read_only() -> bool {
    true
}

/// A PLC device and the program blocks of its software container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub type_identifier: String,
    #[serde(default)]
    pub program_blocks: Vec<BlockConfig>,
}

/// A program block, or a call to one when nested inside a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default = "default_number")]
    pub number: u32,
    #[serde(default)]
    pub programming_language: ProgrammingLanguage,
    #[serde(default)]
    pub source: Option<BlockSource>,
    #[serde(default)]
    pub db: Option<DbConfig>,
    /// Members the block declares itself.
    #[serde(default)]
    pub interface: Vec<InterfaceSection>,
    /// Networks of nested calls, in order.
    #[serde(default)]
    pub network_sources: Vec<Vec<BlockConfig>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub secondary_type: Option<String>,
}

/// Where an externally provided block comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum BlockSource {
    /// A master copy inside a global library.
    Library { library: String, name: String },
    /// A block already present in the project.
    Plc { name: String },
}

impl BlockSource {
    pub fn name(&self) -> &str {
        match self {
            BlockSource::Library { name, .. } | BlockSource::Plc { name } => name,
        }
    }
}

/// Declared data backing of a block or call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DbConfig {
    Global {
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "default_instance_number")]
        number: u32,
    },
    Single {
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "default_instance_number")]
        number: u32,
        #[serde(default)]
        instance_of_name: Option<String>,
    },
    Multi {
        #[serde(default)]
        component_name: Option<String>,
    },
}

fn default_number() -> u32 {
    1
}

fn default_instance_number() -> u32 {
    DEFAULT_INSTANCE_DB_NUMBER
}

impl ProjectConfig {
    /// Parse a JSON project description.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::new("<json>", e.to_string()))
    }

    /// Parse a TOML project description.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::new("<toml>", e.to_string()))
    }

    /// Load and validate a project file; the format follows the extension
    /// (`.toml`, anything else is read as JSON).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let location = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::new(&location, e.to_string()))?;
        let is_toml = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let parsed = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        };
        let config = parsed.map_err(|e| ConfigError::new(&location, e.detail))?;
        config.validate()?;
        Ok(config)
    }

    pub fn device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn library(&self, name: &str) -> Option<&LibraryConfig> {
        self.libraries.iter().find(|l| l.name == name)
    }

    /// Check names, references, and per-kind requirements of every entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::new("name", "project name is empty"));
        }

        let mut libraries = HashSet::new();
        for (i, library) in self.libraries.iter().enumerate() {
            let path = format!("libraries[{i}]");
            if library.name.trim().is_empty() {
                return Err(ConfigError::new(path, "library name is empty"));
            }
            if !libraries.insert(library.name.as_str()) {
                return Err(ConfigError::new(path, format!("library '{}' declared twice", library.name)));
            }
        }

        let mut devices = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(ConfigError::new("devices", "device name is empty"));
            }
            if !devices.insert(device.name.as_str()) {
                return Err(ConfigError::new(&device.name, "device declared twice"));
            }
            let mut blocks = HashSet::new();
            for block in &device.program_blocks {
                let path = format!("{}.{}", device.name, block.name);
                if !blocks.insert(block.name.as_str()) {
                    return Err(ConfigError::new(path, "block declared twice in this device"));
                }
                block.validate(&path, &libraries)?;
            }
        }
        Ok(())
    }
}

impl BlockConfig {
    /// A minimal block of `kind` named `name`.
    pub fn new(name: impl Into<String>, kind: BlockKind) -> Self {
        BlockConfig {
            name: name.into(),
            kind,
            number: default_number(),
            programming_language: ProgrammingLanguage::default(),
            source: None,
            db: None,
            interface: Vec::new(),
            network_sources: Vec::new(),
            title: None,
            secondary_type: None,
        }
    }

    /// Name of the single-instance or global DB when none is configured.
    pub fn default_db_name(&self) -> String {
        format!("{}_DB", self.name)
    }

    /// Name of the Static member backing a multi-instance call.
    pub fn default_component_name(&self) -> String {
        format!("{}_Instance", self.name)
    }

    /// Number of the configured data block, or the instance default.
    pub fn db_number(&self) -> u32 {
        match &self.db {
            Some(DbConfig::Global { number, .. }) | Some(DbConfig::Single { number, .. }) => *number,
            _ => DEFAULT_INSTANCE_DB_NUMBER,
        }
    }

    pub fn is_multi_instance(&self) -> bool {
        matches!(self.db, Some(DbConfig::Multi { .. }))
    }

    /// Binding of this entry when it is called from a network.
    ///
    /// `callee` is the block actually invoked and `sections` its interface,
    /// used only by multi-instance calls. Function calls and function blocks
    /// without a `db` entry default to a plain reference and a `<name>_DB`
    /// single instance respectively.
    pub fn call_binding(&self, callee: &str, sections: Vec<InterfaceSection>) -> DbBinding {
        match &self.db {
            Some(DbConfig::Multi { component_name }) => DbBinding::MultiInstance {
                component_name: component_name.clone().unwrap_or_else(|| self.default_component_name()),
                sections,
            },
            Some(DbConfig::Global { name, .. }) => DbBinding::Global {
                name: name.clone().unwrap_or_else(|| self.default_db_name()),
            },
            Some(DbConfig::Single {
                name, instance_of_name, ..
            }) => DbBinding::SingleInstance {
                name: name.clone().unwrap_or_else(|| self.default_db_name()),
                instance_of_name: instance_of_name.clone().unwrap_or_else(|| callee.to_string()),
            },
            None if self.kind == BlockKind::Function => DbBinding::Global {
                name: callee.to_string(),
            },
            None => DbBinding::SingleInstance {
                name: self.default_db_name(),
                instance_of_name: callee.to_string(),
            },
        }
    }

    fn validate(&self, path: &str, libraries: &HashSet<&str>) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::new(path, "block name is empty"));
        }

        match &self.source {
            Some(BlockSource::Library { library, name }) => {
                if !libraries.contains(library.as_str()) {
                    return Err(ConfigError::new(path, format!("library '{library}' is not declared")));
                }
                if name.trim().is_empty() {
                    return Err(ConfigError::new(path, "master copy name is empty"));
                }
            }
            Some(BlockSource::Plc { name }) if name.trim().is_empty() => {
                return Err(ConfigError::new(path, "source block name is empty"));
            }
            _ => {}
        }

        if self.kind == BlockKind::InstanceDataBlock {
            let has_owner = matches!(
                &self.db,
                Some(DbConfig::Single {
                    instance_of_name: Some(owner),
                    ..
                }) if !owner.trim().is_empty()
            );
            if !has_owner {
                return Err(ConfigError::new(path, "InstanceDB requires db.instance_of_name"));
            }
        }

        if !self.kind.is_code_block() && !self.network_sources.is_empty() {
            return Err(ConfigError::new(path, format!("a {} block cannot carry networks", self.kind)));
        }
        if self.source.is_some() && !self.network_sources.is_empty() {
            return Err(ConfigError::new(path, "a sourced block cannot declare its own networks"));
        }

        for (n, network) in self.network_sources.iter().enumerate() {
            for call in network {
                let call_path = format!("{path}.network[{n}].{}", call.name);
                call.validate(&call_path, libraries)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"{
        "name": "Line_1",
        "libraries": [{ "name": "Lib", "path": "libs/Lib.al18" }],
        "devices": [{
            "name": "PLC_1",
            "device_name": "Cpu",
            "type_identifier": "OrderNumber:6ES7 510-1DJ01-0AB0/V2.0",
            "program_blocks": [{
                "name": "Main",
                "type": "OB",
                "programming_language": "fbd",
                "network_sources": [[
                    { "name": "Sub", "type": "FB", "db": { "type": "single", "name": "Sub_DB" } },
                    { "name": "Logic", "type": "FB", "db": { "type": "multi" },
                      "source": { "from": "library", "library": "Lib", "name": "AndGate" } }
                ]]
            }]
        }]
    }"#;

    #[test]
    fn parses_nested_json() {
        let config = ProjectConfig::from_json_str(PROJECT).unwrap();
        let main = &config.devices[0].program_blocks[0];
        assert_eq!(main.kind, BlockKind::OrganizationBlock);
        assert_eq!(main.number, 1);
        assert_eq!(main.programming_language, ProgrammingLanguage::Fbd);
        assert_eq!(main.network_sources[0].len(), 2);
        let logic = &main.network_sources[0][1];
        assert_eq!(
            logic.source,
            Some(BlockSource::Library {
                library: "Lib".into(),
                name: "AndGate".into()
            })
        );
        assert!(config.libraries[0].read_only);
        config.validate().unwrap();
    }

    #[test]
    fn parses_toml() {
        let config = ProjectConfig::from_toml_str(
            r#"
            name = "Line_1"

            [[devices]]
            name = "PLC_1"

            [[devices.program_blocks]]
            name = "Data"
            type = "DB"
            "#,
        )
        .unwrap();
        assert_eq!(config.devices[0].program_blocks[0].kind, BlockKind::GlobalDataBlock);
    }

    #[test]
    fn call_binding_defaults() {
        let fb = BlockConfig::new("Sub", BlockKind::FunctionBlock);
        assert_eq!(
            fb.call_binding("Sub", Vec::new()),
            DbBinding::SingleInstance {
                name: "Sub_DB".into(),
                instance_of_name: "Sub".into()
            }
        );

        let mut multi = BlockConfig::new("Logic", BlockKind::FunctionBlock);
        multi.db = Some(DbConfig::Multi { component_name: None });
        assert_eq!(multi.call_binding("Logic", Vec::new()).component_name(), "Logic_Instance");

        let fc = BlockConfig::new("Scale", BlockKind::Function);
        assert_eq!(fc.call_binding("Scale", Vec::new()), DbBinding::Global { name: "Scale".into() });
    }

    #[test]
    fn undeclared_library_is_reported_with_path() {
        let content = PROJECT.replace(r#""library": "Lib""#, r#""library": "Missing""#);
        let config = ProjectConfig::from_json_str(&content).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.path, "PLC_1.Main.network[0].Logic");
        assert!(err.detail.contains("Missing"));
    }

    #[test]
    fn instance_db_requires_owner() {
        let mut config = ProjectConfig::from_json_str(PROJECT).unwrap();
        config.devices[0]
            .program_blocks
            .push(BlockConfig::new("Orphan_DB", BlockKind::InstanceDataBlock));
        let err = config.validate().unwrap_err();
        assert_eq!(err.path, "PLC_1.Orphan_DB");
    }

    #[test]
    fn duplicate_block_rejected() {
        let mut config = ProjectConfig::from_json_str(PROJECT).unwrap();
        let main = config.devices[0].program_blocks[0].clone();
        config.devices[0].program_blocks.push(main);
        assert!(config.validate().unwrap_err().detail.contains("twice"));
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        std::fs::write(&path, PROJECT).unwrap();
        assert_eq!(ProjectConfig::load(&path).unwrap().name, "Line_1");

        let bad = dir.path().join("project.toml");
        std::fs::write(&bad, PROJECT).unwrap();
        let err = ProjectConfig::load(&bad).unwrap_err();
        assert!(err.path.ends_with("project.toml"));
    }
}
