//! Block interface model: named sections of typed members.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::block::BlockKind;

/// Recognized interface section names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionName {
    Input,
    Output,
    InOut,
    Static,
    Temp,
    Constant,
}

impl SectionName {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionName::Input => "Input",
            SectionName::Output => "Output",
            SectionName::InOut => "InOut",
            SectionName::Static => "Static",
            SectionName::Temp => "Temp",
            SectionName::Constant => "Constant",
        }
    }

    /// Sections whose members become parameter pins of a multi-instance call.
    pub fn is_pin_section(self) -> bool {
        matches!(self, SectionName::Input | SectionName::Output)
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Input" => Ok(SectionName::Input),
            "Output" => Ok(SectionName::Output),
            "InOut" => Ok(SectionName::InOut),
            "Static" => Ok(SectionName::Static),
            "Temp" => Ok(SectionName::Temp),
            "Constant" => Ok(SectionName::Constant),
            other => Err(format!("unknown interface section '{other}'")),
        }
    }
}

/// One typed member of an interface section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Datatype")]
    pub datatype: String,
    /// System-provided member shown for information only (OB start info).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub informative: bool,
    /// Carries the `SetPoint` boolean attribute (multi-instance statics).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub set_point: bool,
}

impl Member {
    pub fn new(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Member {
            name: name.into(),
            datatype: datatype.into(),
            informative: false,
            set_point: false,
        }
    }

    pub fn informative(mut self) -> Self {
        self.informative = true;
        self
    }

    pub fn with_set_point(mut self) -> Self {
        self.set_point = true;
        self
    }
}

/// A named, ordered sequence of members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSection {
    #[serde(alias = "Name")]
    pub name: SectionName,
    #[serde(default, alias = "Members")]
    pub members: Vec<Member>,
}

impl InterfaceSection {
    pub fn new(name: SectionName) -> Self {
        InterfaceSection {
            name,
            members: Vec::new(),
        }
    }

    pub fn with_members(name: SectionName, members: Vec<Member>) -> Self {
        InterfaceSection { name, members }
    }
}

/// The ordered sections of a block interface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Interface {
    pub sections: Vec<InterfaceSection>,
}

impl Interface {
    pub fn new(sections: Vec<InterfaceSection>) -> Self {
        Interface { sections }
    }

    /// The fixed section skeleton of a block kind.
    ///
    /// OB blocks always carry the informative `Initial_Call` and `Remanence`
    /// inputs. Global data blocks start without sections.
    pub fn skeleton(kind: BlockKind) -> Self {
        use SectionName::*;
        let names: &[SectionName] = match kind {
            BlockKind::OrganizationBlock => &[Input, Temp, Constant],
            BlockKind::FunctionBlock => &[Input, Output, InOut, Static, Temp, Constant],
            BlockKind::Function => &[Input, Output, InOut, Temp, Constant],
            BlockKind::InstanceDataBlock => &[Input, Output, InOut, Static],
            BlockKind::GlobalDataBlock => &[],
        };
        let mut interface = Interface::new(names.iter().copied().map(InterfaceSection::new).collect());
        if kind == BlockKind::OrganizationBlock {
            if let Some(input) = interface.section_mut(Input) {
                input.members.push(Member::new("Initial_Call", "Bool").informative());
                input.members.push(Member::new("Remanence", "Bool").informative());
            }
        }
        interface
    }

    pub fn section(&self, name: SectionName) -> Option<&InterfaceSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_mut(&mut self, name: SectionName) -> Option<&mut InterfaceSection> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// Append members to `name`, creating the section at the end if absent.
    pub fn extend_section(&mut self, name: SectionName, members: impl IntoIterator<Item = Member>) {
        match self.section_mut(name) {
            Some(section) => section.members.extend(members),
            None => self
                .sections
                .push(InterfaceSection::with_members(name, members.into_iter().collect())),
        }
    }

    /// Merge every section of `other` into this interface, in order.
    pub fn merge(&mut self, other: &[InterfaceSection]) {
        for section in other {
            self.extend_section(section.name, section.members.iter().cloned());
        }
    }

    /// Input then Output members in declared order.
    pub fn pin_members(&self) -> Vec<(SectionName, &Member)> {
        pin_members(&self.sections)
    }

    pub fn member_count(&self) -> usize {
        self.sections.iter().map(|s| s.members.len()).sum()
    }

    /// An interface with every section of `self` but no members.
    pub fn hollow(&self) -> Self {
        Interface::new(self.sections.iter().map(|s| InterfaceSection::new(s.name)).collect())
    }
}

/// Input/Output members of `sections`, preserving section and member order.
pub fn pin_members(sections: &[InterfaceSection]) -> Vec<(SectionName, &Member)> {
    sections
        .iter()
        .filter(|s| s.name.is_pin_section())
        .flat_map(|s| s.members.iter().map(move |m| (s.name, m)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ob_skeleton_has_start_info() {
        let iface = Interface::skeleton(BlockKind::OrganizationBlock);
        let input = iface.section(SectionName::Input).unwrap();
        let names: Vec<_> = input.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Initial_Call", "Remanence"]);
        assert!(input.members.iter().all(|m| m.informative && m.datatype == "Bool"));
        assert!(iface.section(SectionName::Static).is_none());
    }

    #[test]
    fn fb_skeleton_section_order() {
        let iface = Interface::skeleton(BlockKind::FunctionBlock);
        let names: Vec<_> = iface.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Input", "Output", "InOut", "Static", "Temp", "Constant"]);
        assert_eq!(iface.member_count(), 0);
    }

    #[test]
    fn pin_members_keep_input_before_output() {
        let sections = vec![
            InterfaceSection::with_members(SectionName::Output, vec![Member::new("Result", "Bool")]),
            InterfaceSection::with_members(SectionName::Static, vec![Member::new("State", "Int")]),
            InterfaceSection::with_members(
                SectionName::Input,
                vec![Member::new("Gate 1", "Bool"), Member::new("Gate 2", "Bool")],
            ),
        ];
        let mut iface = Interface::skeleton(BlockKind::FunctionBlock);
        iface.merge(&sections);
        let pins: Vec<_> = iface
            .pin_members()
            .into_iter()
            .map(|(s, m)| format!("{s}:{}", m.name))
            .collect();
        assert_eq!(pins, vec!["Input:Gate 1", "Input:Gate 2", "Output:Result"]);
    }

    #[test]
    fn extend_creates_missing_section() {
        let mut iface = Interface::skeleton(BlockKind::GlobalDataBlock);
        iface.extend_section(SectionName::Static, [Member::new("Counter", "Int")]);
        assert_eq!(iface.sections.len(), 1);
        assert_eq!(iface.section(SectionName::Static).unwrap().members[0].name, "Counter");
    }

    #[test]
    fn member_accepts_vendor_keys() {
        let member: Member = serde_json::from_str(r#"{"Name": "Gate 1", "Datatype": "Bool"}"#).unwrap();
        assert_eq!(member, Member::new("Gate 1", "Bool"));
    }
}
