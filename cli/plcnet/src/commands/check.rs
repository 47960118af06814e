//! `plcnet check`: load and validate a project configuration.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use plcnet_core::{BlockConfig, BlockSource, ProjectConfig};

use super::load_project;

pub fn run(config: &Path) -> Result<()> {
    let project = load_project(config)?;
    print!("{}", summarize(&project));
    println!("{} is valid", config.display());
    Ok(())
}

/// One line per device and per program block, with call counts.
pub fn summarize(project: &ProjectConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "project '{}': {} librar(ies), {} device(s)",
        project.name,
        project.libraries.len(),
        project.devices.len()
    );
    for device in &project.devices {
        let _ = writeln!(out, "  {} ({} block(s))", device.name, device.program_blocks.len());
        for block in &device.program_blocks {
            let _ = writeln!(out, "    {}", describe(block));
        }
    }
    out
}

fn describe(block: &BlockConfig) -> String {
    let origin = match &block.source {
        Some(BlockSource::Library { library, name }) => format!(" from library {library}/{name}"),
        Some(BlockSource::Plc { name }) => format!(" from plc block {name}"),
        None => String::new(),
    };
    let calls: usize = block.network_sources.iter().map(Vec::len).sum();
    format!(
        "{} {} {}{origin}: {} network(s), {calls} call(s), {} nested",
        block.kind,
        block.number,
        block.name,
        block.network_sources.len(),
        nested_calls(block)
    )
}

/// Calls below the block's own networks.
fn nested_calls(block: &BlockConfig) -> usize {
    block
        .network_sources
        .iter()
        .flatten()
        .map(|call| call.network_sources.iter().map(Vec::len).sum::<usize>() + nested_calls(call))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plcnet_core::BlockKind;

    const PROJECT: &str = r#"{
        "name": "Plant",
        "libraries": [{ "name": "Lib" }],
        "devices": [{
            "name": "PLC_1",
            "program_blocks": [{
                "name": "Main",
                "type": "OB",
                "network_sources": [
                    [
                        { "name": "Logic", "type": "FB", "source": { "from": "library", "library": "Lib", "name": "Logic" } },
                        { "name": "Sub", "type": "FB", "network_sources": [[{ "name": "Leaf", "type": "FC" }]] }
                    ],
                    []
                ]
            }]
        }]
    }"#;

    #[test]
    fn summary_lists_blocks_and_calls() {
        let project = ProjectConfig::from_json_str(PROJECT).unwrap();
        project.validate().unwrap();
        let summary = summarize(&project);
        assert!(summary.starts_with("project 'Plant': 1 librar(ies), 1 device(s)"));
        assert!(summary.contains("  PLC_1 (1 block(s))"));
        assert!(summary.contains("OB 1 Main: 2 network(s), 2 call(s), 1 nested"));
    }

    #[test]
    fn sourced_block_names_its_origin() {
        let mut block = BlockConfig::new("Conveyor", BlockKind::FunctionBlock);
        block.source = Some(BlockSource::Plc {
            name: "Conveyor_Base".into(),
        });
        assert_eq!(
            describe(&block),
            "FB 1 Conveyor from plc block Conveyor_Base: 0 network(s), 0 call(s), 0 nested"
        );
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        std::fs::write(&path, r#"{ "name": "" }"#).unwrap();
        let err = run(&path).unwrap_err();
        assert!(format!("{err:#}").contains("project name is empty"));
    }
}
