//! Serializes a [`BlockDescriptor`] into the vendor interchange document.

use std::fmt;

use log::debug;
use plcnet_core::{BlockDescriptor, BlockKind, Call, CompileUnit, DbBinding, Interface, Member, Wire};
use quick_xml::escape::escape;

use crate::error::Result;
use crate::template::TemplateSet;

/// An encoded XML document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Document(String);

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Document(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders blocks through a borrowed [`TemplateSet`].
///
/// Encoding is a pure function of the descriptor: the same block always
/// yields the same bytes.
#[derive(Debug, Clone)]
pub struct XmlEncoder<'t> {
    templates: &'t TemplateSet,
    engineering_version: Option<String>,
}

impl<'t> XmlEncoder<'t> {
    pub fn new(templates: &'t TemplateSet) -> Self {
        XmlEncoder {
            templates,
            engineering_version: None,
        }
    }

    /// Emit `<Engineering version=".."/>` ahead of the block.
    pub fn with_engineering_version(mut self, version: impl Into<String>) -> Self {
        self.engineering_version = Some(version.into());
        self
    }

    pub fn encode(&self, block: &BlockDescriptor) -> Result<Document> {
        block.validate()?;

        let engineering = match &self.engineering_version {
            Some(version) => self.render("Engineering", &[("VERSION", &escape(version))])?,
            None => String::new(),
        };
        let kind = block.kind.tag();
        let attributes = self.attributes(block)?;
        let objects = self.objects(block)?;
        let body = self.render(
            "Block",
            &[("KIND", kind), ("ATTRIBUTES", &attributes), ("OBJECTS", &objects)],
        )?;
        let text = self.render("Document", &[("ENGINEERING", &engineering), ("BLOCK", &body)])?;

        debug!(
            "encoded {} '{}' ({} network(s), {} bytes)",
            kind,
            block.name,
            block.units.len(),
            text.len()
        );
        Ok(Document(text))
    }

    fn render(&self, name: &str, values: &[(&str, &str)]) -> Result<String> {
        self.templates.render(name, values)
    }

    fn attribute(&self, name: &str, value: &str) -> Result<String> {
        if value.is_empty() {
            self.render("EmptyAttribute", &[("NAME", name)])
        } else {
            self.render("Attribute", &[("NAME", name), ("VALUE", &escape(value))])
        }
    }

    fn attributes(&self, block: &BlockDescriptor) -> Result<String> {
        let mut out = String::new();

        let with_interface = match block.kind {
            BlockKind::GlobalDataBlock => block.interface.member_count() > 0,
            _ => true,
        };
        if with_interface {
            out.push_str(&self.interface(&block.interface)?);
        }
        if block.kind == BlockKind::InstanceDataBlock {
            let owner = block.instance_of_name.as_deref().unwrap_or_default();
            out.push_str(&self.attribute("InstanceOfName", owner)?);
            out.push_str(&self.attribute("InstanceOfType", BlockKind::FunctionBlock.tag())?);
        }
        out.push_str(&self.attribute("Name", &block.name)?);
        out.push_str(&self.attribute("Namespace", "")?);
        out.push_str(&self.attribute("Number", &block.number.to_string())?);
        out.push_str(&self.attribute("ProgrammingLanguage", block.programming_language.as_str())?);
        if block.kind == BlockKind::OrganizationBlock {
            if let Some(secondary) = &block.secondary_type {
                out.push_str(&self.attribute("SecondaryType", secondary)?);
            }
        }
        Ok(out)
    }

    fn interface(&self, interface: &Interface) -> Result<String> {
        let mut sections = String::new();
        for section in &interface.sections {
            let name = section.name.as_str();
            if section.members.is_empty() {
                sections.push_str(&self.render("EmptySection", &[("NAME", name)])?);
                continue;
            }
            let mut members = String::new();
            for member in &section.members {
                members.push_str(&self.member(member)?);
            }
            sections.push_str(&self.render("Section", &[("NAME", name), ("MEMBERS", &members)])?);
        }
        self.render("Interface", &[("SECTIONS", &sections)])
    }

    fn member(&self, member: &Member) -> Result<String> {
        let name = escape(&member.name);
        let datatype = escape(&member.datatype);
        if member.set_point {
            self.render("SetPointMember", &[("NAME", &name), ("DATATYPE", &datatype)])
        } else {
            let informative = if member.informative { " Informative=\"true\"" } else { "" };
            self.render(
                "Member",
                &[("NAME", &name), ("DATATYPE", &datatype), ("INFORMATIVE", informative)],
            )
        }
    }

    fn objects(&self, block: &BlockDescriptor) -> Result<String> {
        if !block.kind.is_code_block() {
            return self.render("EmptyObjectList", &[]);
        }

        let mut items = String::new();
        for unit in &block.units {
            items.push_str(&self.compile_unit(unit)?);
        }
        if let Some(title) = &block.title {
            let (id, item_id) = block.title_ids();
            items.push_str(&self.render(
                "Title",
                &[
                    ("ID", &hex_id(id)),
                    ("ITEM_ID", &hex_id(item_id)),
                    ("TEXT", &escape(title)),
                ],
            )?);
        }

        if items.is_empty() {
            self.render("EmptyObjectList", &[])
        } else {
            self.render("ObjectList", &[("ITEMS", &items)])
        }
    }

    fn compile_unit(&self, unit: &CompileUnit) -> Result<String> {
        let mut parts = String::new();
        for call in &unit.calls {
            parts.push_str(&self.call(call)?);
        }
        let mut wires = String::new();
        for wire in &unit.wires {
            wires.push_str(&self.wire(wire)?);
        }
        self.render(
            "CompileUnit",
            &[
                ("ID", &hex_id(unit.id)),
                ("PARTS", &parts),
                ("WIRES", &wires),
                ("LANGUAGE", unit.programming_language.as_str()),
            ],
        )
    }

    fn call(&self, call: &Call) -> Result<String> {
        // A function has no instance data; its instance uid stays reserved.
        let instance = if call.block_kind == BlockKind::Function {
            String::new()
        } else {
            self.render(
                "Instance",
                &[
                    ("SCOPE", call.binding.scope()),
                    ("UID", &call.instance_uid.to_string()),
                    ("COMPONENT", &escape(call.binding.component_name())),
                ],
            )?
        };

        let mut parameters = String::new();
        if let DbBinding::MultiInstance { .. } = call.binding {
            for pin in &call.parameters {
                parameters.push_str(&self.render(
                    "Parameter",
                    &[
                        ("NAME", &escape(&pin.name)),
                        ("SECTION", pin.section.as_str()),
                        ("DATATYPE", &escape(&pin.datatype)),
                    ],
                )?);
            }
        }

        self.render(
            "Call",
            &[
                ("UID", &call.call_uid.to_string()),
                ("NAME", &escape(&call.name)),
                ("BLOCK_TYPE", call.block_kind.tag()),
                ("INSTANCE", &instance),
                ("PARAMETERS", &parameters),
            ],
        )
    }

    fn wire(&self, wire: &Wire) -> Result<String> {
        match wire {
            Wire::PowerRail { uid, en_uid } => self.render(
                "PowerRailWire",
                &[("UID", &uid.to_string()), ("EN_UID", &en_uid.to_string())],
            ),
            Wire::Chain { uid, eno_uid, en_uid } => self.render(
                "ChainWire",
                &[
                    ("UID", &uid.to_string()),
                    ("ENO_UID", &eno_uid.to_string()),
                    ("EN_UID", &en_uid.to_string()),
                ],
            ),
            Wire::Parameter {
                uid,
                open_con_uid,
                target_uid,
                param_name,
            } => self.render(
                "ParameterWire",
                &[
                    ("UID", &uid.to_string()),
                    ("OPEN_CON_UID", &open_con_uid.to_string()),
                    ("TARGET_UID", &target_uid.to_string()),
                    ("NAME", &escape(param_name)),
                ],
            ),
        }
    }
}

/// Object ids are written in upper-case hexadecimal.
fn hex_id(id: u32) -> String {
    format!("{id:X}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use plcnet_core::{CallSpec, InterfaceSection, ProgrammingLanguage, SectionName, ValidationError};

    use crate::error::XmlError;

    fn single(name: &str, db: &str) -> CallSpec {
        CallSpec::new(
            name,
            BlockKind::FunctionBlock,
            DbBinding::SingleInstance {
                name: db.into(),
                instance_of_name: name.into(),
            },
        )
    }

    fn encode(block: &BlockDescriptor) -> String {
        let templates = TemplateSet::builtin();
        XmlEncoder::new(&templates).encode(block).unwrap().into_string()
    }

    #[test]
    fn fb_with_one_call_matches_vendor_layout() {
        let mut fb = BlockDescriptor::new(BlockKind::FunctionBlock, "Block_1", 1, ProgrammingLanguage::Fbd).unwrap();
        fb.push_network(&[single("Sub_1", "Sub_1_DB")]).unwrap();
        let xml = encode(&fb);

        let expected = r#"<?xml version="1.0" encoding="utf-8"?>
<Document>
  <SW.Blocks.FB ID="0">
    <AttributeList>
      <Interface>
        <Sections xmlns="http://www.siemens.com/automation/Openness/SW/Interface/v5">
          <Section Name="Input" />
          <Section Name="Output" />
          <Section Name="InOut" />
          <Section Name="Static" />
          <Section Name="Temp" />
          <Section Name="Constant" />
        </Sections>
      </Interface>
      <Name>Block_1</Name>
      <Namespace />
      <Number>1</Number>
      <ProgrammingLanguage>FBD</ProgrammingLanguage>
    </AttributeList>
    <ObjectList>
      <SW.Blocks.CompileUnit ID="3" CompositionName="CompileUnits">
        <AttributeList>
          <NetworkSource>
            <FlgNet xmlns="http://www.siemens.com/automation/Openness/SW/NetworkSource/FlgNet/v4">
              <Parts>
                <Call UId="21">
                  <CallInfo Name="Sub_1" BlockType="FB">
                    <Instance Scope="GlobalVariable" UId="22">
                      <Component Name="Sub_1_DB" />
                    </Instance>
                  </CallInfo>
                </Call>
              </Parts>
              <Wires>
                <Wire UId="23">
                  <Powerrail />
                  <NameCon UId="21" Name="en" />
                </Wire>
              </Wires>
            </FlgNet>
          </NetworkSource>
          <ProgrammingLanguage>FBD</ProgrammingLanguage>
        </AttributeList>
      </SW.Blocks.CompileUnit>
    </ObjectList>
  </SW.Blocks.FB>
</Document>
"#;
        assert_eq!(xml, expected);
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut ob = BlockDescriptor::new(BlockKind::OrganizationBlock, "Main", 1, ProgrammingLanguage::Lad).unwrap();
        ob.push_network(&[single("A", "A_DB"), single("B", "B_DB")]).unwrap();
        assert_eq!(encode(&ob), encode(&ob));
    }

    #[test]
    fn ob_has_start_info_and_secondary_type() {
        let ob = BlockDescriptor::new(BlockKind::OrganizationBlock, "Main", 50, ProgrammingLanguage::Lad).unwrap();
        let xml = encode(&ob);
        assert!(xml.contains(r#"<Member Name="Initial_Call" Datatype="Bool" Informative="true" />"#));
        assert!(xml.contains(r#"<Member Name="Remanence" Datatype="Bool" Informative="true" />"#));
        assert!(xml.contains("<Number>1</Number>"));
        assert!(xml.contains("<SecondaryType>ProgramCycle</SecondaryType>"));
        assert!(xml.contains("<ObjectList />"));
    }

    #[test]
    fn unit_ids_are_hexadecimal() {
        let mut fb = BlockDescriptor::new(BlockKind::FunctionBlock, "Fb", 123, ProgrammingLanguage::Lad).unwrap();
        for _ in 0..4 {
            fb.push_network(&[]).unwrap();
        }
        let fb = fb.with_title("Reset");
        let xml = encode(&fb);
        for id in ["3", "8", "D", "12"] {
            assert!(xml.contains(&format!(r#"<SW.Blocks.CompileUnit ID="{id}""#)));
        }
        assert!(xml.contains(r#"<MultilingualText ID="1C" CompositionName="Title">"#));
        assert!(xml.contains(r#"<MultilingualTextItem ID="1D" CompositionName="Items">"#));
    }

    #[test]
    fn multi_instance_renders_parameters_and_set_point() {
        let sections = vec![
            InterfaceSection::with_members(
                SectionName::Input,
                vec![Member::new("Gate 1", "Bool"), Member::new("Gate 2", "Bool")],
            ),
            InterfaceSection::with_members(SectionName::Output, vec![Member::new("Result", "Bool")]),
        ];
        let spec = CallSpec::new(
            "AndGate",
            BlockKind::FunctionBlock,
            DbBinding::MultiInstance {
                component_name: "Logic".into(),
                sections,
            },
        );
        let mut fb = BlockDescriptor::new(BlockKind::FunctionBlock, "Parent", 1, ProgrammingLanguage::Lad).unwrap();
        fb.push_network(&[spec]).unwrap();
        let xml = encode(&fb);

        assert!(xml.contains(r#"<Instance Scope="LocalVariable" UId="22">"#));
        assert!(xml.contains(r#"<Parameter Name="Gate 1" Section="Input" Type="Bool" />"#));
        assert!(xml.contains(r#"<OpenCon UId="32" />"#));
        assert!(xml.contains(r#"<NameCon UId="21" Name="Result" />"#));
        assert!(xml.contains(r#"<Member Name="Logic" Datatype="&quot;AndGate&quot;">"#));
        assert!(xml.contains(r#"<BooleanAttribute Name="SetPoint" SystemDefined="true">true</BooleanAttribute>"#));
        assert_eq!(xml.matches("<OpenCon ").count(), 3);
    }

    #[test]
    fn function_call_has_no_instance() {
        let spec = CallSpec::new("Scale", BlockKind::Function, DbBinding::Global { name: "Scale".into() });
        let mut fc = BlockDescriptor::new(BlockKind::Function, "Outer", 1, ProgrammingLanguage::Lad).unwrap();
        fc.push_network(&[spec]).unwrap();
        let xml = encode(&fc);
        assert!(xml.contains(r#"<CallInfo Name="Scale" BlockType="FC">"#));
        assert!(!xml.contains("<Instance "));
        assert!(xml.contains(r#"<Wire UId="23">"#));
    }

    #[test]
    fn data_blocks_have_no_compile_units() {
        let db = BlockDescriptor::global_db("Data", 124).unwrap();
        let xml = encode(&db);
        assert!(xml.contains("<SW.Blocks.GlobalDB ID=\"0\">"));
        assert!(!xml.contains("<Interface>"));
        assert!(xml.contains("<ObjectList />"));

        let idb = BlockDescriptor::instance_db("Sub_DB", 1, "Sub", &[]).unwrap();
        let xml = encode(&idb);
        assert!(xml.contains("<InstanceOfName>Sub</InstanceOfName>"));
        assert!(xml.contains("<InstanceOfType>FB</InstanceOfType>"));
        assert!(xml.contains("<ProgrammingLanguage>DB</ProgrammingLanguage>"));
        assert!(!xml.contains("<Member "));
    }

    #[test]
    fn names_are_escaped() {
        let fb = BlockDescriptor::new(BlockKind::FunctionBlock, "A&B <1>", 1, ProgrammingLanguage::Lad).unwrap();
        assert!(encode(&fb).contains("<Name>A&amp;B &lt;1&gt;</Name>"));
    }

    #[test]
    fn engineering_version_is_optional() {
        let templates = TemplateSet::builtin();
        let fb = BlockDescriptor::new(BlockKind::FunctionBlock, "Fb", 1, ProgrammingLanguage::Lad).unwrap();
        let xml = XmlEncoder::new(&templates)
            .with_engineering_version("V18")
            .encode(&fb)
            .unwrap();
        assert!(xml.as_str().contains("<Document>\n  <Engineering version=\"V18\" />\n  <SW.Blocks.FB"));
    }

    #[test]
    fn tampered_number_is_rejected() {
        let templates = TemplateSet::builtin();
        let mut fb = BlockDescriptor::new(BlockKind::FunctionBlock, "Fb", 1, ProgrammingLanguage::Lad).unwrap();
        fb.number = 122;
        let err = XmlEncoder::new(&templates).encode(&fb).unwrap_err();
        assert!(matches!(
            err,
            XmlError::Validation(ValidationError::BlockNumberOutOfRange { number: 122, .. })
        ));
    }
}
