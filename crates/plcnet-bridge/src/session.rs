//! Serialized, timed access to one engineering service.
//!
//! The service lives on a dedicated worker thread. Every call is shipped
//! to it as a job over a channel and runs there in submission order; the
//! caller waits for the answer with a deadline.
//!
//! A job whose caller timed out still runs to completion. Its outcome is
//! kept as a [`LateOutcome`], and the next call first waits for it to end.

use std::fmt;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::service::{BlockRef, EngineeringService, ImportPolicy, MasterCopyRef};
use crate::transient::TransientFile;

type Job = Box<dyn FnOnce(&mut dyn EngineeringService) + Send>;

/// A call that finished after its caller had stopped waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateOutcome {
    pub operation: String,
    pub succeeded: bool,
}

impl fmt::Display for LateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.succeeded { "succeeded" } else { "failed" };
        write!(f, "{} {verdict} after timing out", self.operation)
    }
}

/// Handle to the worker thread owning an [`EngineeringService`].
pub struct Session {
    tx: mpsc::Sender<Job>,
    timeout: Duration,
    /// Completion signal of the last job abandoned on timeout.
    straggler: Mutex<Option<mpsc::Receiver<()>>>,
    late: Arc<Mutex<Vec<LateOutcome>>>,
}

impl Session {
    /// Move `service` onto its own thread.
    pub fn spawn(service: Box<dyn EngineeringService>, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        thread::spawn(move || {
            let mut service = service;
            for job in rx {
                job(service.as_mut());
            }
            debug!("engineering session worker stopped");
        });
        Session {
            tx,
            timeout,
            straggler: Mutex::new(None),
            late: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Calls that completed after reporting a timeout, oldest first.
    pub fn late_outcomes(&self) -> Vec<LateOutcome> {
        lock(&self.late).clone()
    }

    /// Wait at most the session timeout for an abandoned job to end.
    pub fn settle(&self) -> ServiceResult<()> {
        let mut straggler = lock(&self.straggler);
        let Some(done) = straggler.take() else {
            return Ok(());
        };
        match done.recv_timeout(self.timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => Ok(()),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                *straggler = Some(done);
                Err(ServiceError::Timeout(self.timeout))
            }
        }
    }

    /// Run `f` on the worker and wait at most the session timeout.
    ///
    /// Everything `f` captures is dropped on the worker once `f` returns,
    /// also when the caller has already timed out.
    pub fn call<T, F>(&self, operation: &str, f: F) -> ServiceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn EngineeringService) -> ServiceResult<T> + Send + 'static,
    {
        if let Err(err) = self.settle() {
            warn!("session: {operation} not started, an earlier call is still running");
            return Err(err);
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let reply = Arc::new(Mutex::new(Some(reply_tx)));
        let job_reply = Arc::clone(&reply);
        let late = Arc::clone(&self.late);
        let name = operation.to_string();
        let job: Job = Box::new(move |service: &mut dyn EngineeringService| {
            let result = f(service);
            let sender = lock(&job_reply).take();
            match sender {
                Some(tx) => {
                    let _ = tx.send(result);
                }
                None => {
                    let outcome = LateOutcome {
                        operation: name,
                        succeeded: result.is_ok(),
                    };
                    warn!("session: {outcome}");
                    lock(&late).push(outcome);
                }
            }
            let _ = done_tx.send(());
        });
        debug!("session: {operation}");
        self.tx.send(job).map_err(|_| ServiceError::Unavailable)?;

        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                lock(&reply).take();
                // The answer may have landed between the deadline and the take.
                if let Ok(result) = reply_rx.try_recv() {
                    return result;
                }
                warn!("session: {operation} timed out after {:?}", self.timeout);
                *lock(&self.straggler) = Some(done_rx);
                Err(ServiceError::Timeout(self.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ServiceError::Unavailable),
        }
    }

    pub fn find_master_copy(&self, library: &str, name: &str) -> ServiceResult<MasterCopyRef> {
        let (library, name) = (library.to_string(), name.to_string());
        self.call("find_master_copy", move |s| s.find_master_copy(&library, &name))
    }

    pub fn create_from_master_copy(&self, container: &str, copy: &MasterCopyRef) -> ServiceResult<BlockRef> {
        let (container, copy) = (container.to_string(), copy.clone());
        self.call("create_from_master_copy", move |s| s.create_from_master_copy(&container, &copy))
    }

    pub fn set_attribute(&self, block: &BlockRef, name: &str, value: &str) -> ServiceResult<()> {
        let (block, name, value) = (block.clone(), name.to_string(), value.to_string());
        self.call("set_attribute", move |s| s.set_attribute(&block, &name, &value))
    }

    pub fn compile(&self, block: &BlockRef) -> ServiceResult<()> {
        let block = block.clone();
        self.call("compile", move |s| s.compile(&block))
    }

    /// Export `block` into `file` and read it back, both on the worker.
    pub fn export(&self, block: &BlockRef, file: TransientFile) -> ServiceResult<String> {
        let block = block.clone();
        self.call("export", move |s| {
            s.export(&block, file.path())?;
            Ok(file.read_to_string()?)
        })
    }

    /// Import `file`, which is removed once the collaborator is done with it.
    pub fn import_xml(&self, container: &str, file: TransientFile, policy: ImportPolicy) -> ServiceResult<BlockRef> {
        let container = container.to_string();
        self.call("import_xml", move |s| s.import_xml(&container, file.path(), policy))
    }

    pub fn create_instance_db(
        &self,
        container: &str,
        name: &str,
        number: u32,
        instance_of: &str,
    ) -> ServiceResult<BlockRef> {
        let (container, name, instance_of) = (container.to_string(), name.to_string(), instance_of.to_string());
        self.call("create_instance_db", move |s| {
            s.create_instance_db(&container, &name, number, &instance_of)
        })
    }

    pub fn find_block(&self, container: &str, name: &str) -> ServiceResult<BlockRef> {
        let (container, name) = (container.to_string(), name.to_string());
        self.call("find_block", move |s| s.find_block(&container, &name))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
