//! `plcnet build`: generate every program block through the session.

use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;
use plcnet_bridge::{Checkpoint, GenerationReport, Generator};
use plcnet_xml::XmlEncoder;

use super::{load_project, open_bridge, SessionOptions};
use crate::manifest::PlcnetManifest;

/// Run the full pipeline and fail when any block could not be generated.
pub fn run(
    project_dir: &Path,
    manifest: &PlcnetManifest,
    config: &Path,
    options: &SessionOptions<'_>,
    resume: bool,
) -> Result<()> {
    let report = generate(project_dir, manifest, config, options, resume)?;
    println!("{report}");
    if !report.is_success() {
        bail!("{} block(s) failed", report.failed.len());
    }
    Ok(())
}

pub fn generate(
    project_dir: &Path,
    manifest: &PlcnetManifest,
    config: &Path,
    options: &SessionOptions<'_>,
    resume: bool,
) -> Result<GenerationReport> {
    let project = load_project(config)?;
    let templates = manifest.templates(project_dir)?;
    let bridge = open_bridge(project_dir, manifest, &templates, options)?;

    let checkpoint_path = manifest.checkpoint_path(project_dir);
    let checkpoint = if resume {
        let checkpoint = Checkpoint::load(&checkpoint_path)
            .with_context(|| format!("reading checkpoint {}", checkpoint_path.display()))?;
        info!("resuming with {} recorded block(s)", checkpoint.len());
        checkpoint
    } else {
        Checkpoint::fresh(&checkpoint_path)
    };

    let mut encoder = XmlEncoder::new(&templates);
    if let Some(version) = &manifest.xml.engineering_version {
        encoder = encoder.with_engineering_version(version);
    }
    let mut generator = Generator::new(&bridge, encoder, checkpoint);
    Ok(generator.generate_project(&project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init::create_project;

    #[test]
    fn example_project_builds_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join("plant");
        create_project(&project_dir, "plant").unwrap();
        let manifest = PlcnetManifest::from_str(&std::fs::read_to_string(project_dir.join("plcnet.toml")).unwrap())
            .unwrap();
        let config = manifest.config_path(&project_dir);
        let options = SessionOptions::default();

        let report = generate(&project_dir, &manifest, &config, &options, false).unwrap();
        assert!(report.is_complete(), "{report}");
        let generated: Vec<_> = report.generated.iter().map(|l| l.block.as_str()).collect();
        assert_eq!(generated, vec!["Settings", "Interlock", "Motor", "Main"]);

        let blocks = project_dir.join("session/projects/PLC_1");
        for name in ["Settings", "Interlock", "Motor", "Motor_DB", "Main"] {
            assert!(blocks.join(format!("{name}.xml")).is_file(), "{name} missing");
        }
        let main = std::fs::read_to_string(blocks.join("Main.xml")).unwrap();
        assert!(main.contains("<Engineering version=\"V18\" />"));

        let report = generate(&project_dir, &manifest, &config, &options, true).unwrap();
        assert!(report.generated.is_empty(), "{report}");
        assert_eq!(report.resumed.len(), 4);
    }

    #[test]
    fn session_override_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join("plant");
        create_project(&project_dir, "plant").unwrap();
        let manifest = PlcnetManifest::default();
        let elsewhere = dir.path().join("other-session");
        let options = SessionOptions {
            root: Some(&elsewhere),
            timeout_secs: Some(5),
        };

        let report = generate(&project_dir, &manifest, &manifest.config_path(&project_dir), &options, false).unwrap();
        assert!(report.is_success(), "{report}");
        assert!(elsewhere.join("projects/PLC_1/Main.xml").is_file());
    }

    #[test]
    fn failed_block_fails_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("project.json");
        std::fs::write(
            &config,
            r#"{ "name": "Plant", "devices": [{ "name": "PLC_1", "program_blocks": [
                { "name": "Reserved", "type": "FB", "number": 122 }
            ] }] }"#,
        )
        .unwrap();
        let err = run(dir.path(), &PlcnetManifest::default(), &config, &SessionOptions::default(), false).unwrap_err();
        assert_eq!(err.to_string(), "1 block(s) failed");
    }
}
