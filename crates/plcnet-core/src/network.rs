//! Network (compile unit) graph: calls, parameter pins, and wires.
//!
//! Every graphical element of a network is addressed by a [`Uid`] that is
//! unique within its compile unit. Wires reference existing uids through
//! their `NameCon` endpoints and own the uids of their `OpenCon` stubs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::block::{BlockKind, ProgrammingLanguage};
use crate::error::{Result, ValidationError};
use crate::interface::{InterfaceSection, SectionName};

/// Identifier of a graphical element inside one compile unit.
pub type Uid = u32;

/// First uid handed out inside a compile unit.
pub const FIRST_UID: Uid = 21;

/// Id of the first compile unit of a block.
pub const FIRST_UNIT_ID: u32 = 3;

/// Distance between consecutive compile unit ids.
pub const UNIT_ID_STEP: u32 = 5;

/// How a call is backed by data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DbBinding {
    /// The call references a standalone global data block.
    Global { name: String },
    /// One instance data block exclusively owned by the call.
    SingleInstance {
        name: String,
        instance_of_name: String,
    },
    /// Instance data embedded in the caller's Static section.
    MultiInstance {
        component_name: String,
        sections: Vec<InterfaceSection>,
    },
}

impl DbBinding {
    /// `Scope` attribute of the rendered `Instance` element.
    pub fn scope(&self) -> &'static str {
        match self {
            DbBinding::Global { .. } | DbBinding::SingleInstance { .. } => "GlobalVariable",
            DbBinding::MultiInstance { .. } => "LocalVariable",
        }
    }

    /// Name of the data the call's instance refers to.
    pub fn component_name(&self) -> &str {
        match self {
            DbBinding::Global { name } | DbBinding::SingleInstance { name, .. } => name,
            DbBinding::MultiInstance { component_name, .. } => component_name,
        }
    }

    pub fn is_multi_instance(&self) -> bool {
        matches!(self, DbBinding::MultiInstance { .. })
    }
}

/// A parameter pin exposed by a multi-instance call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterPin {
    pub name: String,
    pub section: SectionName,
    pub datatype: String,
    pub uid: Uid,
}

/// One invocation of a block inside a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub call_uid: Uid,
    pub instance_uid: Uid,
    /// Name of the called block.
    pub name: String,
    pub block_kind: BlockKind,
    pub block_number: u32,
    pub binding: DbBinding,
    /// Non-empty only for multi-instance bindings.
    pub parameters: Vec<ParameterPin>,
}

/// A connection between two pins of one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "wire", rename_all = "snake_case")]
pub enum Wire {
    /// Power rail to the first call's `en`.
    PowerRail { uid: Uid, en_uid: Uid },
    /// Call *i-1* `eno` to call *i* `en`.
    Chain { uid: Uid, eno_uid: Uid, en_uid: Uid },
    /// Open stub to a named parameter pin of a multi-instance call.
    Parameter {
        uid: Uid,
        open_con_uid: Uid,
        target_uid: Uid,
        param_name: String,
    },
}

impl Wire {
    pub fn uid(&self) -> Uid {
        match self {
            Wire::PowerRail { uid, .. } | Wire::Chain { uid, .. } | Wire::Parameter { uid, .. } => *uid,
        }
    }

    /// Uids allocated by this wire (its own and its open stub).
    fn owned_uids(&self) -> Vec<Uid> {
        match self {
            Wire::Parameter { uid, open_con_uid, .. } => vec![*uid, *open_con_uid],
            other => vec![other.uid()],
        }
    }
}

/// One network/rung of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileUnit {
    pub id: u32,
    pub calls: Vec<Call>,
    pub wires: Vec<Wire>,
    pub programming_language: ProgrammingLanguage,
    #[serde(default)]
    pub title: Option<String>,
}

impl CompileUnit {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.wires.is_empty()
    }

    /// Every uid allocated inside this unit, in allocation-independent order.
    pub fn allocated_uids(&self) -> Vec<Uid> {
        let mut uids = Vec::new();
        for call in &self.calls {
            uids.push(call.call_uid);
            uids.push(call.instance_uid);
            uids.extend(call.parameters.iter().map(|p| p.uid));
        }
        for wire in &self.wires {
            uids.extend(wire.owned_uids());
        }
        uids
    }

    /// Check uid uniqueness and call ordering.
    pub fn check(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for uid in self.allocated_uids() {
            if !seen.insert(uid) {
                return Err(ValidationError::DuplicateUid { unit: self.id, uid });
            }
        }

        let mut previous: Option<Uid> = None;
        for call in &self.calls {
            let ordered = match previous {
                None => call.call_uid == FIRST_UID,
                Some(prev) => call.call_uid > prev,
            };
            if !ordered {
                return Err(ValidationError::CallOrder {
                    unit: self.id,
                    uid: call.call_uid,
                });
            }
            previous = Some(call.call_uid);
        }
        Ok(())
    }
}

/// Id of the compile unit at position `index` within its block.
pub fn unit_id(index: usize) -> u32 {
    FIRST_UNIT_ID + UNIT_ID_STEP * index as u32
}
