//! CLI command implementations.

pub mod build;
pub mod check;
pub mod encode;
pub mod init;

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use plcnet_bridge::{ImportExportBridge, LocalSession, Session};
use plcnet_core::ProjectConfig;
use plcnet_xml::TemplateSet;

use crate::manifest::PlcnetManifest;

/// Load and validate a project configuration file.
pub fn load_project(path: &Path) -> Result<ProjectConfig> {
    ProjectConfig::load(path).with_context(|| format!("loading project {}", path.display()))
}

/// Session overrides given on the command line.
#[derive(Debug, Default, Clone)]
pub struct SessionOptions<'a> {
    pub root: Option<&'a Path>,
    pub timeout_secs: Option<u64>,
}

/// Open the local session of `project_dir` and wrap it in a bridge.
pub fn open_bridge(
    project_dir: &Path,
    manifest: &PlcnetManifest,
    templates: &TemplateSet,
    options: &SessionOptions<'_>,
) -> Result<ImportExportBridge> {
    let root = match options.root {
        Some(root) => root.to_path_buf(),
        None => manifest.session_root(project_dir),
    };
    let timeout = options
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| manifest.timeout());
    let local = LocalSession::open(&root)
        .with_context(|| format!("opening session {}", root.display()))?
        .with_templates(templates.clone());

    let temp_dir = manifest.temp_dir(project_dir);
    fs::create_dir_all(&temp_dir).with_context(|| format!("creating {}", temp_dir.display()))?;

    log::debug!("session {} (timeout {timeout:?})", root.display());
    Ok(ImportExportBridge::new(
        Session::spawn(Box::new(local), timeout),
        temp_dir,
    ))
}
