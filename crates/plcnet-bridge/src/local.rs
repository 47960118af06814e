//! A file-backed engineering service.
//!
//! Libraries and projects are plain directories of interchange documents:
//!
//! ```text
//! <root>/libraries/<library>/<master copy>.xml
//! <root>/projects/<container>/<block>.xml
//! ```
//!
//! Compilation checks that a block document is readable and names itself
//! consistently; nothing is executed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use plcnet_core::BlockDescriptor;
use plcnet_xml::{document_block_name, parse_interface, replace_attribute, TemplateSet, XmlEncoder, XmlError};

use crate::error::{ServiceError, ServiceResult};
use crate::service::{BlockRef, EngineeringService, ImportPolicy, MasterCopyRef};

const LIBRARIES: &str = "libraries";
const PROJECTS: &str = "projects";

/// Engineering service over a directory tree.
#[derive(Debug)]
pub struct LocalSession {
    root: PathBuf,
    templates: TemplateSet,
}

impl LocalSession {
    /// Open (creating if needed) the tree rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(LIBRARIES))?;
        fs::create_dir_all(root.join(PROJECTS))?;
        Ok(LocalSession {
            root,
            templates: TemplateSet::builtin(),
        })
    }

    /// Templates used to encode the instance data blocks this service creates.
    pub fn with_templates(mut self, templates: TemplateSet) -> Self {
        self.templates = templates;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn library_dir(&self, library: &str) -> PathBuf {
        self.root.join(LIBRARIES).join(library)
    }

    pub fn container_dir(&self, container: &str) -> PathBuf {
        self.root.join(PROJECTS).join(container)
    }

    pub fn block_path(&self, block: &BlockRef) -> PathBuf {
        self.container_dir(&block.container).join(format!("{}.xml", block.name))
    }

    /// Store `document` as master copy `name` of `library`.
    pub fn add_master_copy(&self, library: &str, name: &str, document: &str) -> io::Result<PathBuf> {
        let dir = self.library_dir(library);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{name}.xml"));
        fs::write(&path, document)?;
        Ok(path)
    }

    /// Names of the blocks in `container`, sorted.
    pub fn blocks(&self, container: &str) -> io::Result<Vec<String>> {
        let dir = self.container_dir(container);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "xml") {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_block(&self, block: &BlockRef) -> ServiceResult<String> {
        let path = self.block_path(block);
        if !path.is_file() {
            return Err(not_found("block", block.to_string()));
        }
        Ok(fs::read_to_string(path)?)
    }

    fn write_block(&self, block: &BlockRef, document: &str) -> ServiceResult<()> {
        fs::create_dir_all(self.container_dir(&block.container))?;
        fs::write(self.block_path(block), document)?;
        Ok(())
    }
}

fn not_found(what: &str, name: impl Into<String>) -> ServiceError {
    ServiceError::NotFound {
        what: what.to_string(),
        name: name.into(),
    }
}

fn invalid(err: XmlError) -> ServiceError {
    ServiceError::InvalidDocument {
        detail: err.to_string(),
    }
}

impl EngineeringService for LocalSession {
    fn find_master_copy(&mut self, library: &str, name: &str) -> ServiceResult<MasterCopyRef> {
        let dir = self.library_dir(library);
        if !dir.is_dir() {
            return Err(not_found("library", library));
        }
        if !dir.join(format!("{name}.xml")).is_file() {
            return Err(not_found("master copy", format!("{library}/{name}")));
        }
        Ok(MasterCopyRef {
            library: library.to_string(),
            name: name.to_string(),
        })
    }

    fn create_from_master_copy(&mut self, container: &str, copy: &MasterCopyRef) -> ServiceResult<BlockRef> {
        let path = self.library_dir(&copy.library).join(format!("{}.xml", copy.name));
        let document = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => not_found("master copy", format!("{}/{}", copy.library, copy.name)),
            _ => ServiceError::Io(e),
        })?;
        let name = document_block_name(&document).map_err(invalid)?;
        let block = BlockRef::new(container, name);
        self.write_block(&block, &document)?;
        info!("created {block} from master copy {}/{}", copy.library, copy.name);
        Ok(block)
    }

    fn set_attribute(&mut self, block: &BlockRef, name: &str, value: &str) -> ServiceResult<()> {
        let document = self.read_block(block)?;
        let updated = replace_attribute(&document, name, value).map_err(invalid)?;
        if name == "Name" && value != block.name {
            let renamed = BlockRef::new(block.container.clone(), value);
            self.write_block(&renamed, &updated)?;
            fs::remove_file(self.block_path(block))?;
            debug!("renamed {block} to {renamed}");
        } else {
            self.write_block(block, &updated)?;
        }
        Ok(())
    }

    fn compile(&mut self, block: &BlockRef) -> ServiceResult<()> {
        let document = self.read_block(block)?;
        let failed = |detail: String| ServiceError::CompileFailed {
            block: block.to_string(),
            detail,
        };
        let named = document_block_name(&document).map_err(|e| failed(e.to_string()))?;
        if named != block.name {
            return Err(failed(format!("document names the block '{named}'")));
        }
        parse_interface(&document).map_err(|e| failed(e.to_string()))?;
        debug!("compiled {block}");
        Ok(())
    }

    fn export(&mut self, block: &BlockRef, path: &Path) -> ServiceResult<()> {
        let document = self.read_block(block)?;
        fs::write(path, document)?;
        Ok(())
    }

    fn import_xml(&mut self, container: &str, path: &Path, policy: ImportPolicy) -> ServiceResult<BlockRef> {
        let document = fs::read_to_string(path)?;
        let name = document_block_name(&document).map_err(invalid)?;
        let block = BlockRef::new(container, name);
        if policy == ImportPolicy::Reject && self.block_path(&block).exists() {
            return Err(ServiceError::ImportRejected {
                container: container.to_string(),
                detail: format!("block '{}' already exists", block.name),
            });
        }
        self.write_block(&block, &document)?;
        debug!("imported {block}");
        Ok(block)
    }

    fn create_instance_db(
        &mut self,
        container: &str,
        name: &str,
        number: u32,
        instance_of: &str,
    ) -> ServiceResult<BlockRef> {
        let owner = BlockRef::new(container, instance_of);
        let sections = parse_interface(&self.read_block(&owner)?).map_err(invalid)?;
        let rejected = |detail: String| ServiceError::ImportRejected {
            container: container.to_string(),
            detail,
        };
        let db = BlockDescriptor::instance_db(name, number, instance_of, &sections).map_err(|e| rejected(e.to_string()))?;
        let document = XmlEncoder::new(&self.templates)
            .encode(&db)
            .map_err(|e| rejected(e.to_string()))?;
        let block = BlockRef::new(container, name);
        self.write_block(&block, document.as_str())?;
        Ok(block)
    }

    fn find_block(&mut self, container: &str, name: &str) -> ServiceResult<BlockRef> {
        let block = BlockRef::new(container, name);
        if self.block_path(&block).is_file() {
            Ok(block)
        } else {
            Err(not_found("block", block.to_string()))
        }
    }
}
