//! Network assembly: turns an ordered list of call specs into a compile unit.
//!
//! Allocation rule, per compile unit:
//! 1. A cursor starts at [`FIRST_UID`].
//! 2. Each call takes `call_uid`, then `instance_uid`, then one uid per
//!    Input/Output member when multi-instance.
//! 3. After all calls: one power-rail wire, then one chain wire per
//!    following call, then for each multi-instance call one parameter wire
//!    per pin (wire uid followed by its open-connection uid).

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::block::{BlockKind, ProgrammingLanguage};
use crate::error::{Result, ValidationError};
use crate::interface::pin_members;
use crate::network::{Call, CompileUnit, DbBinding, ParameterPin, Uid, Wire, FIRST_UID};

/// A resolved call, ready to be placed in a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSpec {
    /// Name of the called block.
    pub name: String,
    pub block_kind: BlockKind,
    pub block_number: u32,
    pub binding: DbBinding,
}

impl CallSpec {
    pub fn new(name: impl Into<String>, block_kind: BlockKind, binding: DbBinding) -> Self {
        CallSpec {
            name: name.into(),
            block_kind,
            block_number: 1,
            binding,
        }
    }

    pub fn with_number(mut self, number: u32) -> Self {
        self.block_number = number;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                what: "called block".into(),
            });
        }
        if !self.block_kind.is_callable() {
            return Err(ValidationError::NotCallable {
                call: self.name.clone(),
                kind: self.block_kind,
            });
        }
        if self.block_kind == BlockKind::Function
            && matches!(
                self.binding,
                DbBinding::SingleInstance { .. } | DbBinding::MultiInstance { .. }
            )
        {
            return Err(ValidationError::InstanceOnFunction {
                call: self.name.clone(),
                kind: self.block_kind,
            });
        }
        if self.block_kind == BlockKind::FunctionBlock && self.binding.component_name().trim().is_empty() {
            return Err(ValidationError::EmptyName {
                what: format!("instance of call '{}'", self.name),
            });
        }
        if let DbBinding::MultiInstance { sections, .. } = &self.binding {
            let mut seen = HashSet::new();
            for (_, member) in pin_members(sections) {
                if !seen.insert(member.name.as_str()) {
                    return Err(ValidationError::DuplicateParameter {
                        call: self.name.clone(),
                        parameter: member.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Monotonic uid cursor for one compile unit.
#[derive(Debug, Clone)]
pub struct UidAllocator {
    next: Uid,
}

impl UidAllocator {
    pub fn new() -> Self {
        UidAllocator { next: FIRST_UID }
    }

    /// Hand out the next free uid.
    pub fn allocate(&mut self) -> Uid {
        let uid = self.next;
        self.next += 1;
        uid
    }

    /// The uid the next call to [`allocate`](Self::allocate) returns.
    pub fn peek(&self) -> Uid {
        self.next
    }
}

impl Default for UidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the call/wire graph of one network.
#[derive(Debug, Clone)]
pub struct NetworkAssembler {
    unit_id: u32,
    language: ProgrammingLanguage,
}

impl NetworkAssembler {
    pub fn new(unit_id: u32, language: ProgrammingLanguage) -> Self {
        NetworkAssembler { unit_id, language }
    }

    /// Assemble `specs` into a compile unit.
    ///
    /// An empty list yields a legal, empty network.
    pub fn assemble(&self, specs: &[CallSpec]) -> Result<CompileUnit> {
        let mut alloc = UidAllocator::new();
        let mut calls = Vec::with_capacity(specs.len());

        for spec in specs {
            spec.validate()?;
            let call_uid = alloc.allocate();
            let instance_uid = alloc.allocate();
            let parameters = match &spec.binding {
                DbBinding::MultiInstance { sections, .. } => pin_members(sections)
                    .into_iter()
                    .map(|(section, member)| ParameterPin {
                        name: member.name.clone(),
                        section,
                        datatype: member.datatype.clone(),
                        uid: alloc.allocate(),
                    })
                    .collect(),
                _ => Vec::new(),
            };
            calls.push(Call {
                call_uid,
                instance_uid,
                name: spec.name.clone(),
                block_kind: spec.block_kind,
                block_number: spec.block_number,
                binding: spec.binding.clone(),
                parameters,
            });
        }

        let wires = wire_calls(&calls, &mut alloc);

        debug!(
            "assembled compile unit {}: {} call(s), {} wire(s), next uid {}",
            self.unit_id,
            calls.len(),
            wires.len(),
            alloc.peek()
        );

        let unit = CompileUnit {
            id: self.unit_id,
            calls,
            wires,
            programming_language: self.language,
            title: None,
        };
        unit.check()?;
        Ok(unit)
    }
}

fn wire_calls(calls: &[Call], alloc: &mut UidAllocator) -> Vec<Wire> {
    let mut wires = Vec::new();

    if let Some(first) = calls.first() {
        wires.push(Wire::PowerRail {
            uid: alloc.allocate(),
            en_uid: first.call_uid,
        });
    }
    for pair in calls.windows(2) {
        wires.push(Wire::Chain {
            uid: alloc.allocate(),
            eno_uid: pair[0].call_uid,
            en_uid: pair[1].call_uid,
        });
    }
    for call in calls {
        for pin in &call.parameters {
            let uid = alloc.allocate();
            let open_con_uid = alloc.allocate();
            wires.push(Wire::Parameter {
                uid,
                open_con_uid,
                target_uid: call.call_uid,
                param_name: pin.name.clone(),
            });
        }
    }
    wires
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{InterfaceSection, Member, SectionName};

    fn single(name: &str) -> CallSpec {
        CallSpec::new(
            name,
            BlockKind::FunctionBlock,
            DbBinding::SingleInstance {
                name: format!("{name}_DB"),
                instance_of_name: name.to_string(),
            },
        )
    }

    fn gate_sections() -> Vec<InterfaceSection> {
        vec![
            InterfaceSection::with_members(
                SectionName::Input,
                vec![Member::new("Gate 1", "Bool"), Member::new("Gate 2", "Bool")],
            ),
            InterfaceSection::with_members(SectionName::Output, vec![Member::new("Result", "Bool")]),
            InterfaceSection::with_members(SectionName::Static, vec![Member::new("Memory", "Bool")]),
        ]
    }

    fn multi(name: &str, sections: Vec<InterfaceSection>) -> CallSpec {
        CallSpec::new(
            name,
            BlockKind::FunctionBlock,
            DbBinding::MultiInstance {
                component_name: format!("{name}_Instance"),
                sections,
            },
        )
    }

    fn assemble(specs: &[CallSpec]) -> CompileUnit {
        NetworkAssembler::new(3, ProgrammingLanguage::Fbd)
            .assemble(specs)
            .unwrap()
    }

    #[test]
    fn empty_network() {
        let unit = assemble(&[]);
        assert!(unit.calls.is_empty());
        assert!(unit.wires.is_empty());
        assert_eq!(unit.id, 3);
    }

    #[test]
    fn single_call_gets_power_rail() {
        let unit = assemble(&[single("Sub")]);
        assert_eq!(unit.calls[0].call_uid, 21);
        assert_eq!(unit.calls[0].instance_uid, 22);
        assert_eq!(unit.wires, vec![Wire::PowerRail { uid: 23, en_uid: 21 }]);
    }

    #[test]
    fn two_calls_are_chained() {
        let unit = assemble(&[single("Reset_1"), single("Reset_2")]);
        let uids: Vec<_> = unit.calls.iter().map(|c| (c.call_uid, c.instance_uid)).collect();
        assert_eq!(uids, vec![(21, 22), (23, 24)]);
        assert_eq!(
            unit.wires,
            vec![
                Wire::PowerRail { uid: 25, en_uid: 21 },
                Wire::Chain {
                    uid: 26,
                    eno_uid: 21,
                    en_uid: 23
                },
            ]
        );
    }

    #[test]
    fn n_plain_calls_give_n_enable_wires() {
        for n in 1..8 {
            let specs: Vec<_> = (0..n).map(|i| single(&format!("Call_{i}"))).collect();
            let unit = assemble(&specs);
            let rails = unit.wires.iter().filter(|w| matches!(w, Wire::PowerRail { .. })).count();
            let chains = unit.wires.iter().filter(|w| matches!(w, Wire::Chain { .. })).count();
            assert_eq!(rails, 1);
            assert_eq!(chains, n - 1);
        }
    }

    #[test]
    fn multi_instance_pins_and_parameter_wires() {
        let unit = assemble(&[multi("Logic", gate_sections())]);
        let call = &unit.calls[0];
        let pins: Vec<_> = call.parameters.iter().map(|p| (p.name.as_str(), p.section, p.uid)).collect();
        assert_eq!(
            pins,
            vec![
                ("Gate 1", SectionName::Input, 23),
                ("Gate 2", SectionName::Input, 24),
                ("Result", SectionName::Output, 25),
            ]
        );

        assert_eq!(unit.wires[0], Wire::PowerRail { uid: 26, en_uid: 21 });
        let params: Vec<_> = unit
            .wires
            .iter()
            .filter_map(|w| match w {
                Wire::Parameter {
                    uid,
                    open_con_uid,
                    target_uid,
                    param_name,
                } => Some((*uid, *open_con_uid, *target_uid, param_name.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            params,
            vec![
                (27, 28, 21, "Gate 1"),
                (29, 30, 21, "Gate 2"),
                (31, 32, 21, "Result"),
            ]
        );
    }

    #[test]
    fn multi_instance_without_sections_is_a_plain_link() {
        let unit = assemble(&[single("A"), multi("B", Vec::new())]);
        assert!(unit.calls[1].parameters.is_empty());
        assert_eq!(unit.wires.len(), 2);
        assert!(matches!(unit.wires[1], Wire::Chain { eno_uid: 21, en_uid: 23, .. }));
    }

    #[test]
    fn uids_are_pairwise_distinct_in_mixed_networks() {
        let specs = vec![
            single("A"),
            multi("B", gate_sections()),
            single("C"),
            multi("D", gate_sections()),
        ];
        let unit = assemble(&specs);
        let uids = unit.allocated_uids();
        let unique: HashSet<_> = uids.iter().collect();
        assert_eq!(uids.len(), unique.len());
        assert!(unit.calls.windows(2).all(|w| w[0].call_uid < w[1].call_uid));
    }

    #[test]
    fn organization_block_callee_is_rejected() {
        let spec = CallSpec::new(
            "Main",
            BlockKind::OrganizationBlock,
            DbBinding::Global { name: "Data".into() },
        );
        let err = NetworkAssembler::new(3, ProgrammingLanguage::Lad)
            .assemble(&[spec])
            .unwrap_err();
        assert!(matches!(err, ValidationError::NotCallable { .. }));
    }

    #[test]
    fn function_with_instance_is_rejected() {
        let spec = CallSpec::new(
            "Scale",
            BlockKind::Function,
            DbBinding::SingleInstance {
                name: "Scale_DB".into(),
                instance_of_name: "Scale".into(),
            },
        );
        let err = NetworkAssembler::new(3, ProgrammingLanguage::Lad)
            .assemble(&[spec])
            .unwrap_err();
        assert!(matches!(err, ValidationError::InstanceOnFunction { .. }));
    }

    #[test]
    fn duplicate_pin_is_rejected() {
        let sections = vec![
            InterfaceSection::with_members(SectionName::Input, vec![Member::new("X", "Bool")]),
            InterfaceSection::with_members(SectionName::Output, vec![Member::new("X", "Bool")]),
        ];
        let err = NetworkAssembler::new(3, ProgrammingLanguage::Lad)
            .assemble(&[multi("Dup", sections)])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateParameter {
                call: "Dup".into(),
                parameter: "X".into()
            }
        );
    }
}
