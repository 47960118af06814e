//! `plcnet encode`: print the interchange document of one block.

use std::path::Path;

use anyhow::{bail, Context, Result};
use log::warn;
use plcnet_bridge::{build_descriptor, Checkpoint, InstanceResolver, Location};
use plcnet_core::{BlockDescriptor, BlockKind, DeviceConfig, ProjectConfig};
use plcnet_xml::{Document, TemplateSet, XmlEncoder};

use super::{load_project, open_bridge, SessionOptions};
use crate::manifest::PlcnetManifest;

pub fn run(project_dir: &Path, manifest: &PlcnetManifest, config: &Path, block: &str, device: Option<&str>) -> Result<()> {
    let project = load_project(config)?;
    let templates = manifest.templates(project_dir)?;
    let document = encode_block(project_dir, manifest, &templates, &project, block, device)?;
    print!("{document}");
    Ok(())
}

/// Encode program block `block_name` of the selected device.
///
/// Sourced calls are resolved through the session; calls that cannot be
/// resolved are logged and left out, as a build would.
pub fn encode_block(
    project_dir: &Path,
    manifest: &PlcnetManifest,
    templates: &TemplateSet,
    project: &ProjectConfig,
    block_name: &str,
    device_name: Option<&str>,
) -> Result<Document> {
    let device = select_device(project, device_name)?;
    let config = device
        .program_blocks
        .iter()
        .find(|b| b.name == block_name)
        .with_context(|| format!("block '{block_name}' not found in device '{}'", device.name))?;

    let descriptor = if config.source.is_some() {
        bail!("block '{block_name}' is taken from a source and has no document of its own");
    } else if config.kind == BlockKind::InstanceDataBlock {
        bail!("instance data block '{block_name}' is created by the session, not encoded");
    } else if config.kind == BlockKind::GlobalDataBlock {
        let mut db = BlockDescriptor::global_db(&config.name, config.number)?;
        db.declare(&config.interface)?;
        db
    } else {
        let bridge = open_bridge(project_dir, manifest, templates, &SessionOptions::default())?;
        let mut checkpoint = Checkpoint::in_memory();
        let resolved = InstanceResolver::new(&bridge, &mut checkpoint, &device.name).resolve(config);
        for failure in &resolved.failures {
            warn!("{failure}");
        }
        build_descriptor(config, &resolved.networks, &Location::block(&device.name, &config.name))?
    };

    let mut encoder = XmlEncoder::new(templates);
    if let Some(version) = &manifest.xml.engineering_version {
        encoder = encoder.with_engineering_version(version);
    }
    encoder
        .encode(&descriptor)
        .with_context(|| format!("encoding block '{block_name}'"))
}

fn select_device<'p>(project: &'p ProjectConfig, name: Option<&str>) -> Result<&'p DeviceConfig> {
    match (name, project.devices.as_slice()) {
        (Some(name), _) => project
            .device(name)
            .with_context(|| format!("device '{name}' not found")),
        (None, [only]) => Ok(only),
        (None, []) => bail!("project '{}' has no devices", project.name),
        (None, devices) => bail!("project has {} devices; choose one with --device", devices.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"{
        "name": "Plant",
        "devices": [{
            "name": "PLC_1",
            "program_blocks": [
                { "name": "Settings", "type": "GlobalDB", "number": 300,
                  "interface": [{ "name": "Static", "members": [{ "name": "Speed", "datatype": "Int" }] }] },
                { "name": "Main", "type": "OB",
                  "network_sources": [[{ "name": "Sub", "type": "FB", "db": { "type": "single", "name": "Sub_DB" } }]] },
                { "name": "Sub_DB", "type": "InstanceDB", "db": { "type": "single", "instance_of_name": "Sub" } }
            ]
        }]
    }"#;

    fn encode(block: &str, device: Option<&str>) -> Result<Document> {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectConfig::from_json_str(PROJECT).unwrap();
        let manifest = PlcnetManifest::default();
        let templates = TemplateSet::builtin();
        encode_block(dir.path(), &manifest, &templates, &project, block, device)
    }

    #[test]
    fn code_block_is_encoded_with_its_calls() {
        let document = encode("Main", None).unwrap();
        let text = document.as_str();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(text.contains("<SW.Blocks.OB ID=\"0\">"));
        assert!(text.contains("<Call UId=\"21\">"));
        assert!(text.contains("<Component Name=\"Sub_DB\" />"));
    }

    #[test]
    fn global_db_is_encoded_directly() {
        let document = encode("Settings", Some("PLC_1")).unwrap();
        assert!(document.as_str().contains("<Number>300</Number>"));
        assert!(document.as_str().contains("Name=\"Speed\""));
    }

    #[test]
    fn instance_db_and_unknown_names_are_rejected() {
        let err = encode("Sub_DB", None).unwrap_err();
        assert!(err.to_string().contains("created by the session"));
        let err = encode("Nope", None).unwrap_err();
        assert!(err.to_string().contains("block 'Nope' not found"));
        let err = encode("Main", Some("PLC_9")).unwrap_err();
        assert!(err.to_string().contains("device 'PLC_9' not found"));
    }

    #[test]
    fn device_must_be_chosen_when_ambiguous() {
        let mut project = ProjectConfig::from_json_str(PROJECT).unwrap();
        let mut second = project.devices[0].clone();
        second.name = "PLC_2".into();
        project.devices.push(second);
        let err = select_device(&project, None).unwrap_err();
        assert!(err.to_string().contains("choose one with --device"));
        assert_eq!(select_device(&project, Some("PLC_2")).unwrap().name, "PLC_2");
    }
}
