//! `plcnet.toml` tool manifest.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use plcnet_xml::TemplateSet;
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "plcnet.toml";

/// Tool settings shared by every command of a project directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlcnetManifest {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub xml: XmlSection,
}

/// Where the project description lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Project configuration file (JSON or TOML).
    #[serde(default = "default_config")]
    pub config: PathBuf,
}

impl Default for ProjectSection {
    fn default() -> Self {
        ProjectSection { config: default_config() }
    }
}

fn default_config() -> PathBuf {
    PathBuf::from("project.json")
}

/// The engineering session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Root directory of the local session.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Deadline for a single collaborator call, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Scratch directory for transient import/export files.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for SessionSection {
    fn default() -> Self {
        SessionSection {
            root: default_root(),
            timeout_secs: default_timeout(),
            temp_dir: None,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("session")
}

fn default_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_checkpoint")]
    pub checkpoint: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        OutputSection {
            checkpoint: default_checkpoint(),
        }
    }
}

fn default_checkpoint() -> PathBuf {
    PathBuf::from(".plcnet/checkpoint.json")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XmlSection {
    /// Directory of template overrides.
    #[serde(default)]
    pub templates: Option<PathBuf>,
    /// Emitted as `<Engineering version=".."/>` when set.
    #[serde(default)]
    pub engineering_version: Option<String>,
}

impl PlcnetManifest {
    /// Search upward from `start_dir` for a `plcnet.toml` file, parse and return
    /// it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: PlcnetManifest =
                    toml::from_str(&content).with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing plcnet.toml")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.session.timeout_secs)
    }

    pub fn config_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.project.config)
    }

    pub fn session_root(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.session.root)
    }

    pub fn temp_dir(&self, project_dir: &Path) -> PathBuf {
        match &self.session.temp_dir {
            Some(dir) => project_dir.join(dir),
            None => std::env::temp_dir(),
        }
    }

    pub fn checkpoint_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.output.checkpoint)
    }

    /// Builtin templates with the configured overrides applied.
    pub fn templates(&self, project_dir: &Path) -> Result<TemplateSet> {
        match &self.xml.templates {
            Some(dir) => {
                let dir = project_dir.join(dir);
                TemplateSet::with_overrides(&dir).with_context(|| format!("loading templates from {}", dir.display()))
            }
            None => Ok(TemplateSet::builtin()),
        }
    }

    /// Generate the default manifest for `plcnet init`.
    pub fn template(name: &str) -> String {
        format!(
            r#"# plcnet settings for {name}

[project]
config = "project.json"

[session]
root = "session"
timeout_secs = 120

[output]
checkpoint = ".plcnet/checkpoint.json"

[xml]
engineering_version = "V18"
"#
        )
    }
}
