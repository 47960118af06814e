//! Moves documents between the encoder and the engineering session.

use std::path::{Path, PathBuf};

use log::{debug, info};
use plcnet_core::InterfaceSection;
use plcnet_xml::{parse_interface, Document};

use crate::error::{Failure, ServiceError};
use crate::service::{BlockRef, ImportPolicy};
use crate::session::Session;
use crate::transient::TransientFile;

/// Import/export through transient files in a scratch directory.
pub struct ImportExportBridge {
    session: Session,
    temp_dir: PathBuf,
}

impl ImportExportBridge {
    pub fn new(session: Session, temp_dir: impl Into<PathBuf>) -> Self {
        ImportExportBridge {
            session,
            temp_dir: temp_dir.into(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Import `document` into `container`, replacing a block of the same name.
    ///
    /// The transient file is handed to the session and removed there, after
    /// the collaborator is done with it.
    pub fn import_block(&self, document: &Document, container: &str) -> Result<BlockRef, Failure> {
        let file = TransientFile::create(&self.temp_dir, document.as_bytes())?;
        let block = self
            .session
            .import_xml(container, file, ImportPolicy::Override)
            .map_err(Failure::service("import"))?;
        info!("imported {block}");
        Ok(block)
    }

    /// Export `block` and return its raw document.
    pub fn export_document(&self, block: &BlockRef) -> Result<Document, Failure> {
        let file = TransientFile::reserve(&self.temp_dir);
        let text = self
            .session
            .export(block, file)
            .map_err(Failure::service("export"))?;
        debug!("exported {block} ({} bytes)", text.len());
        Ok(Document::new(text))
    }

    /// Export `block` and return its interface sections, without `Constant`.
    pub fn export_block(&self, block: &BlockRef) -> Result<Vec<InterfaceSection>, Failure> {
        let document = self.export_document(block)?;
        parse_interface(document.as_str()).map_err(|e| {
            Failure::service("parse export")(ServiceError::InvalidDocument { detail: e.to_string() })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Duration;

    use crate::error::ServiceResult;
    use crate::service::{EngineeringService, MasterCopyRef};

    /// Writes exports and accepts imports, each after `delay`.
    struct Sluggish {
        delay: Duration,
    }

    impl EngineeringService for Sluggish {
        fn find_master_copy(&mut self, library: &str, name: &str) -> ServiceResult<MasterCopyRef> {
            Ok(MasterCopyRef {
                library: library.into(),
                name: name.into(),
            })
        }
        fn create_from_master_copy(&mut self, container: &str, copy: &MasterCopyRef) -> ServiceResult<BlockRef> {
            Ok(BlockRef::new(container, copy.name.clone()))
        }
        fn set_attribute(&mut self, _: &BlockRef, _: &str, _: &str) -> ServiceResult<()> {
            Ok(())
        }
        fn compile(&mut self, _: &BlockRef) -> ServiceResult<()> {
            Ok(())
        }
        fn export(&mut self, _: &BlockRef, path: &Path) -> ServiceResult<()> {
            thread::sleep(self.delay);
            fs::write(path, "<Document />")?;
            Ok(())
        }
        fn import_xml(&mut self, container: &str, path: &Path, _: ImportPolicy) -> ServiceResult<BlockRef> {
            thread::sleep(self.delay);
            fs::read_to_string(path)?;
            Ok(BlockRef::new(container, "Late"))
        }
        fn create_instance_db(&mut self, container: &str, name: &str, _: u32, _: &str) -> ServiceResult<BlockRef> {
            Ok(BlockRef::new(container, name))
        }
        fn find_block(&mut self, container: &str, name: &str) -> ServiceResult<BlockRef> {
            Ok(BlockRef::new(container, name))
        }
    }

    fn bridge(dir: &Path, delay: Duration, timeout: Duration) -> ImportExportBridge {
        let session = Session::spawn(Box::new(Sluggish { delay }), timeout);
        ImportExportBridge::new(session, dir)
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn round_trip_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge(dir.path(), Duration::ZERO, Duration::from_secs(5));
        let block = bridge.import_block(&Document::new("<Document />"), "PLC_1").unwrap();
        assert_eq!(block, BlockRef::new("PLC_1", "Late"));
        let document = bridge.export_document(&block).unwrap();
        assert_eq!(document.as_str(), "<Document />");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn timed_out_export_removes_its_file_once_finished() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge(dir.path(), Duration::from_millis(200), Duration::from_millis(50));
        let err = bridge.export_document(&BlockRef::new("PLC_1", "Fb")).unwrap_err();
        assert!(err.is_timeout(), "{err}");

        thread::sleep(Duration::from_millis(500));
        assert!(leftovers(dir.path()).is_empty(), "left behind: {:?}", leftovers(dir.path()));
        let late = bridge.session().late_outcomes();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].operation, "export");
    }

    #[test]
    fn timed_out_import_is_recorded_when_it_lands() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge(dir.path(), Duration::from_millis(300), Duration::from_millis(200));
        let err = bridge.import_block(&Document::new("<Document />"), "PLC_1").unwrap_err();
        assert!(err.is_timeout(), "{err}");

        bridge.session().settle().unwrap();
        assert!(leftovers(dir.path()).is_empty());
        assert_eq!(
            bridge.session().late_outcomes()[0].to_string(),
            "import_xml succeeded after timing out"
        );
    }
}
