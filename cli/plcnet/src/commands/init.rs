//! `plcnet init`: project scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::manifest::{PlcnetManifest, MANIFEST_FILE};

/// Create a new project in directory `name`, relative to cwd.
pub fn run(name: &str) -> Result<()> {
    let project_dir = Path::new(name);
    create_project(project_dir, name)
}

pub(crate) fn create_project(project_dir: &Path, name: &str) -> Result<()> {
    if project_dir.exists() {
        bail!("directory '{}' already exists", project_dir.display());
    }

    fs::create_dir_all(project_dir.join("session").join("libraries")).context("creating session/libraries/")?;
    fs::create_dir_all(project_dir.join("session").join("projects")).context("creating session/projects/")?;

    fs::write(project_dir.join(MANIFEST_FILE), PlcnetManifest::template(name)).context("writing plcnet.toml")?;
    fs::write(project_dir.join("project.json"), example_project(name)).context("writing project.json")?;
    fs::write(project_dir.join(".gitignore"), ".plcnet/\nsession/projects/\n").context("writing .gitignore")?;

    println!("Created project '{name}'");
    println!("  {name}/{MANIFEST_FILE}");
    println!("  {name}/project.json");
    println!("  {name}/session/libraries/");
    println!("  {name}/session/projects/");
    println!("  {name}/.gitignore");

    Ok(())
}

/// A small cyclic program: one OB calling a motor FB, which calls an FC.
fn example_project(name: &str) -> String {
    format!(
        r#"{{
  "name": "{name}",
  "libraries": [],
  "devices": [
    {{
      "name": "PLC_1",
      "device_name": "Station_1",
      "type_identifier": "OrderNumber:6ES7 513-1AL02-0AB0/V2.6",
      "program_blocks": [
        {{
          "name": "Settings",
          "type": "GlobalDB",
          "number": 200,
          "interface": [
            {{ "name": "Static", "members": [{{ "name": "Speed", "datatype": "Int" }}] }}
          ]
        }},
        {{
          "name": "Main",
          "type": "OB",
          "title": "Cyclic program",
          "network_sources": [
            [
              {{
                "name": "Motor",
                "type": "FB",
                "db": {{ "type": "single", "name": "Motor_DB" }},
                "interface": [
                  {{ "name": "Input", "members": [{{ "name": "Start", "datatype": "Bool" }}] }},
                  {{ "name": "Output", "members": [{{ "name": "Running", "datatype": "Bool" }}] }}
                ],
                "network_sources": [
                  [{{ "name": "Interlock", "type": "FC" }}]
                ]
              }}
            ]
          ]
        }}
      ]
    }}
  ]
}}
"#
    )
}
