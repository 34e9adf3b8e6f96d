//! Background analysis service.
//!
//! [`AnalysisService`] moves an [`Analyzer`] onto a worker thread that is its
//! only user from then on. Callers send triggers and receive lifecycle
//! events; every finished run is published as an immutable
//! `Arc<AnalysisResult>` snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Callers                    │  Worker Thread                     │
//! │  ───────                    │  ─────────────                     │
//! │  notify_changed(paths) ─────┼→ recv(), then drain with try_recv  │
//! │  request_full_rebuild() ────┼→ coalesce into one pending run     │
//! │    (also raises the         │  run full, or prepare incremental  │
//! │     rebuild flag)           │  flag raised? discard, Superseded  │
//! │  subscribe() ←──────────────┼─ CycleFound / CycleResolved / ...  │
//! │  latest() ←─────────────────┼─ Arc<AnalysisResult> snapshot      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Coalescing
//!
//! - `Changed` triggers that queue up while the worker is busy are merged
//!   (union of paths) into one incremental run.
//! - A pending `FullRebuild` absorbs any pending `Changed` paths.
//! - A `FullRebuild` requested while an incremental run is in flight
//!   supersedes it: the incremental result is dropped before commit (no
//!   events besides `Superseded`, no cache or cycle changes) and the full
//!   rebuild runs next.
//! - `Shutdown` stops the worker once the run in flight is done; triggers
//!   queued behind it are dropped.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::types::{AnalysisMode, AnalysisResult, Cycle, ResolvedCycle};
use crate::Analyzer;

/// Lifecycle events published by the service.
#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    /// A run has started.
    Started {
        /// Kind of run
        mode: AnalysisMode,
        /// Paths requested for an incremental run (0 for a full run)
        requested_paths: usize,
    },
    /// A run was committed and its snapshot published.
    Completed(Arc<AnalysisResult>),
    /// A run failed; the previous snapshot stays current.
    Failed {
        /// Rendered error
        message: String,
    },
    /// A cycle not present in the previous result.
    CycleFound(Cycle),
    /// A previously known cycle is gone.
    CycleResolved(ResolvedCycle),
    /// An incremental run was discarded in favour of a full rebuild.
    Superseded {
        /// Paths the discarded run covered
        discarded_paths: usize,
    },
}

/// Requests sent to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Trigger {
    Changed(Vec<PathBuf>),
    FullRebuild,
    Shutdown,
}

/// Work accumulated from one or more triggers.
#[derive(Debug, Default, PartialEq, Eq)]
struct Pending {
    paths: BTreeSet<PathBuf>,
    full: bool,
    shutdown: bool,
}

impl Pending {
    fn absorb(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::Changed(paths) => self.paths.extend(paths),
            Trigger::FullRebuild => self.full = true,
            Trigger::Shutdown => self.shutdown = true,
        }
    }

    fn is_empty(&self) -> bool {
        self.paths.is_empty() && !self.full && !self.shutdown
    }
}

/// State shared between the handle and the worker.
#[derive(Default)]
struct Shared {
    rebuild_requested: AtomicBool,
    subscribers: Mutex<Vec<Sender<AnalysisEvent>>>,
    latest: RwLock<Option<Arc<AnalysisResult>>>,
}

impl Shared {
    fn emit(&self, event: &AnalysisEvent) {
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.retain(|s| s.send(event.clone()).is_ok()),
            Err(e) => error!(error = %e, "Subscriber list poisoned, dropping event"),
        }
    }

    fn publish(&self, outcome: Result<AnalysisResult>) {
        let result = match outcome {
            Ok(result) => Arc::new(result),
            Err(e) => {
                error!(error = %e, "Analysis run failed");
                self.emit(&AnalysisEvent::Failed {
                    message: e.to_string(),
                });
                return;
            }
        };

        match self.latest.write() {
            Ok(mut latest) => *latest = Some(Arc::clone(&result)),
            Err(e) => error!(error = %e, "Snapshot slot poisoned, result not stored"),
        }
        for cycle in result.new_cycles() {
            self.emit(&AnalysisEvent::CycleFound(cycle.clone()));
        }
        for resolved in &result.resolved {
            self.emit(&AnalysisEvent::CycleResolved(resolved.clone()));
        }
        self.emit(&AnalysisEvent::Completed(result));
    }
}

/// Handle to a running analysis worker.
pub struct AnalysisService {
    sender: Sender<Trigger>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<Analyzer>>,
}

impl AnalysisService {
    /// Start a worker thread that owns `analyzer`.
    #[must_use]
    pub fn spawn(analyzer: Analyzer) -> Self {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let handle = thread::spawn(move || worker_loop(analyzer, &receiver, &worker_shared));

        Self {
            sender,
            shared,
            handle: Some(handle),
        }
    }

    /// Ask for an incremental run over `paths`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the worker is no longer running.
    pub fn notify_changed(&self, paths: Vec<PathBuf>) -> Result<()> {
        self.send(Trigger::Changed(paths))
    }

    /// Ask for a full rebuild, superseding any incremental run in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the worker is no longer running.
    pub fn request_full_rebuild(&self) -> Result<()> {
        self.shared.rebuild_requested.store(true, Ordering::SeqCst);
        self.send(Trigger::FullRebuild)
    }

    /// Receive every event published from now on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the subscriber list is poisoned.
    pub fn subscribe(&self) -> Result<Receiver<AnalysisEvent>> {
        let (sender, receiver) = mpsc::channel();
        self.shared
            .subscribers
            .lock()
            .map_err(|e| Error::Internal(format!("subscriber list poisoned: {e}")))?
            .push(sender);
        Ok(receiver)
    }

    /// The most recently committed result, if any run has finished.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the snapshot slot is poisoned.
    pub fn latest(&self) -> Result<Option<Arc<AnalysisResult>>> {
        self.shared
            .latest
            .read()
            .map(|latest| latest.clone())
            .map_err(|e| Error::Internal(format!("snapshot slot poisoned: {e}")))
    }

    /// Stop the worker and take the analyzer back.
    ///
    /// Blocks until the run in flight (if any) is finished.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the worker thread panicked.
    pub fn shutdown(mut self) -> Result<Analyzer> {
        // A worker that already exited has dropped its receiver; join anyway.
        let _ = self.sender.send(Trigger::Shutdown);
        let Some(handle) = self.handle.take() else {
            return Err(Error::Internal("analysis worker already joined".to_string()));
        };
        handle.join().map_err(|panic_payload| {
            let msg = if let Some(s) = panic_payload.downcast_ref::<&str>() {
                format!("Analysis worker panicked: {s}")
            } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                format!("Analysis worker panicked: {s}")
            } else {
                "Analysis worker panicked with unknown payload".to_string()
            };
            error!(panic_msg = %msg, "Background analysis worker panicked");
            Error::Internal(msg)
        })
    }

    fn send(&self, trigger: Trigger) -> Result<()> {
        self.sender
            .send(trigger)
            .map_err(|_| Error::Internal("analysis worker is not running".to_string()))
    }
}

impl Drop for AnalysisService {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.sender.send(Trigger::Shutdown);
            let _ = handle.join();
        }
    }
}

fn worker_loop(mut analyzer: Analyzer, receiver: &Receiver<Trigger>, shared: &Shared) -> Analyzer {
    let mut pending = Pending::default();
    loop {
        if pending.is_empty() {
            match receiver.recv() {
                Ok(trigger) => pending.absorb(trigger),
                Err(_) => break,
            }
        }
        while let Ok(trigger) = receiver.try_recv() {
            pending.absorb(trigger);
        }
        if pending.shutdown {
            break;
        }

        let work = std::mem::take(&mut pending);
        if let Some(next) = run_pending(&mut analyzer, work, shared) {
            pending = next;
        }
    }
    info!("Analysis worker stopped");
    analyzer
}

/// Run one unit of coalesced work. Returns follow-up work when the run was
/// superseded.
fn run_pending(analyzer: &mut Analyzer, work: Pending, shared: &Shared) -> Option<Pending> {
    if work.full {
        shared.rebuild_requested.store(false, Ordering::SeqCst);
        shared.emit(&AnalysisEvent::Started {
            mode: AnalysisMode::Full,
            requested_paths: 0,
        });
        shared.publish(analyzer.run_full_analysis());
        return None;
    }

    let paths: Vec<PathBuf> = work.paths.into_iter().collect();
    shared.emit(&AnalysisEvent::Started {
        mode: AnalysisMode::Incremental,
        requested_paths: paths.len(),
    });
    let run = analyzer.prepare_incremental(&paths);

    if shared.rebuild_requested.load(Ordering::SeqCst) {
        debug!(paths = paths.len(), "Discarding incremental run for a full rebuild");
        drop(run);
        shared.emit(&AnalysisEvent::Superseded {
            discarded_paths: paths.len(),
        });
        return Some(Pending {
            full: true,
            ..Pending::default()
        });
    }

    shared.publish(analyzer.commit(run));
    None
}
