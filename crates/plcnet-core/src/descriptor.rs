//! In-memory description of one block to be generated.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::assemble::{CallSpec, NetworkAssembler};
use crate::block::{check_number, normalize_number, BlockKind, ProgrammingLanguage};
use crate::error::{Result, ValidationError};
use crate::interface::{Interface, InterfaceSection, Member, SectionName};
use crate::network::{unit_id, CompileUnit, DbBinding};

/// Default `SecondaryType` of organization blocks.
pub const DEFAULT_SECONDARY_TYPE: &str = "ProgramCycle";

/// One PLC block: kind, identity, interface, and networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub kind: BlockKind,
    pub name: String,
    pub number: u32,
    pub programming_language: ProgrammingLanguage,
    pub interface: Interface,
    pub units: Vec<CompileUnit>,
    /// OB only.
    #[serde(default)]
    pub secondary_type: Option<String>,
    /// InstanceDB only: the function block this instance belongs to.
    #[serde(default)]
    pub instance_of_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl BlockDescriptor {
    /// Create a block with the section skeleton of `kind` and no networks.
    ///
    /// The number is normalized and range-checked here, so every descriptor
    /// in circulation already satisfies the block-number rule.
    pub fn new(
        kind: BlockKind,
        name: impl Into<String>,
        number: u32,
        programming_language: ProgrammingLanguage,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                what: format!("{kind} block"),
            });
        }
        let number = normalize_number(kind, number)?;
        let programming_language = if kind.is_code_block() {
            programming_language
        } else {
            ProgrammingLanguage::Db
        };
        Ok(BlockDescriptor {
            kind,
            name,
            number,
            programming_language,
            interface: Interface::skeleton(kind),
            units: Vec::new(),
            secondary_type: (kind == BlockKind::OrganizationBlock).then(|| DEFAULT_SECONDARY_TYPE.to_string()),
            instance_of_name: None,
            title: None,
        })
    }

    /// A standalone global data block.
    pub fn global_db(name: impl Into<String>, number: u32) -> Result<Self> {
        Self::new(BlockKind::GlobalDataBlock, name, number, ProgrammingLanguage::Db)
    }

    /// An instance data block of `instance_of`, with a hollow copy of its sections.
    pub fn instance_db(
        name: impl Into<String>,
        number: u32,
        instance_of: impl Into<String>,
        sections: &[InterfaceSection],
    ) -> Result<Self> {
        let instance_of = instance_of.into();
        if instance_of.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                what: "instance-of block".into(),
            });
        }
        let mut block = Self::new(BlockKind::InstanceDataBlock, name, number, ProgrammingLanguage::Db)?;
        let owned: Vec<InterfaceSection> = sections
            .iter()
            .filter(|s| block.interface.section(s.name).is_some())
            .cloned()
            .collect();
        let mut callee = block.interface.clone();
        callee.merge(&owned);
        block.interface = callee.hollow();
        block.instance_of_name = Some(instance_of);
        Ok(block)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_secondary_type(mut self, secondary_type: impl Into<String>) -> Self {
        if self.kind == BlockKind::OrganizationBlock {
            self.secondary_type = Some(secondary_type.into());
        }
        self
    }

    /// Merge the block's own declared members into its sections.
    pub fn declare(&mut self, sections: &[InterfaceSection]) -> Result<()> {
        let mut staged = self.interface.clone();
        for section in sections {
            for member in &section.members {
                add_member(&mut staged, section.name, member.clone())?;
            }
        }
        self.interface = staged;
        Ok(())
    }

    /// Assemble `specs` into a new network appended after the existing ones.
    ///
    /// Multi-instance calls add one `SetPoint` member per call to the Static
    /// section, typed by the callee block.
    pub fn push_network(&mut self, specs: &[CallSpec]) -> Result<&mut CompileUnit> {
        if !self.kind.is_code_block() {
            return Err(ValidationError::NetworksOnDataBlock { kind: self.kind });
        }
        for spec in specs.iter().filter(|s| s.binding.is_multi_instance()) {
            if !self.kind.has_static_section() {
                return Err(ValidationError::MultiInstanceWithoutStatic {
                    call: spec.name.clone(),
                    parent: self.kind,
                });
            }
        }

        let id = unit_id(self.units.len());
        let unit = NetworkAssembler::new(id, self.programming_language).assemble(specs)?;

        let statics: Vec<Member> = unit
            .calls
            .iter()
            .filter_map(|call| match &call.binding {
                DbBinding::MultiInstance { component_name, .. } => {
                    Some(Member::new(component_name.clone(), quoted(&call.name)).with_set_point())
                }
                _ => None,
            })
            .collect();
        let mut staged = self.interface.clone();
        for member in statics {
            add_member(&mut staged, SectionName::Static, member)?;
        }
        self.interface = staged;

        debug!(
            "block '{}': network {} with {} call(s)",
            self.name,
            id,
            unit.calls.len()
        );
        self.units.push(unit);
        let last = self.units.len() - 1;
        Ok(&mut self.units[last])
    }

    /// Ids of the optional title text and its single item.
    pub fn title_ids(&self) -> (u32, u32) {
        let id = unit_id(self.units.len() + 1);
        (id, id + 1)
    }

    /// Re-check every invariant that must hold before encoding.
    pub fn validate(&self) -> Result<()> {
        check_number(self.kind, self.number)?;
        if !self.kind.is_code_block() && !self.units.is_empty() {
            return Err(ValidationError::NetworksOnDataBlock { kind: self.kind });
        }
        let mut ids = HashSet::new();
        for unit in &self.units {
            if !ids.insert(unit.id) {
                return Err(ValidationError::DuplicateUnitId { id: unit.id });
            }
            unit.check()?;
        }
        Ok(())
    }
}

fn add_member(interface: &mut Interface, section: SectionName, member: Member) -> Result<()> {
    let existing = interface.section(section).map(|s| s.members.as_slice()).unwrap_or_default();
    if existing.iter().any(|m| m.name == member.name) {
        return Err(ValidationError::DuplicateMember {
            section: section.to_string(),
            name: member.name,
        });
    }
    interface.extend_section(section, [member]);
    Ok(())
}

/// Datatype of a member typed by a block: the block name in double quotes.
fn quoted(block: &str) -> String {
    format!("\"{block}\"")
}
