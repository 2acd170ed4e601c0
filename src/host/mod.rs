//! RunHost: queues procedures and drives each through its lifecycle.
//!
//! The host knows nothing about acquisition. It calls `startup`, `execute`
//! and `shutdown` in order on one run at a time, persists every emitted
//! point to the run's temporary file, republishes it on a broadcast channel
//! for live consumers, and owns the cancellation token of the active run.

mod events;
mod temp_store;

pub use events::{RunEvent, RunOutcome, RunReport};
pub use temp_store::TempStore;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{log_acquisition_error, AcquisitionError};
use crate::hardware::DaqDriver;
use crate::procedure::{
    AcquisitionProcedure, CancelToken, Procedure, RunParameters, SamplePoint, SampleSink,
    StepOutcome,
};
use crate::results::ResultsWriter;

struct QueuedRun {
    run_id: u64,
    procedure: Box<dyn Procedure>,
}

pub struct RunHost {
    driver: Arc<dyn DaqDriver>,
    known_samples: Vec<String>,
    temp: TempStore,
    events: broadcast::Sender<RunEvent>,
    queue: Mutex<VecDeque<QueuedRun>>,
    active: Mutex<Option<CancelToken>>,
    // Abort that arrived while the next run was queued but not yet started
    abort_next: AtomicBool,
    // Held for the whole of a run so runs never overlap
    run_lock: Mutex<()>,
    next_id: AtomicU64,
}

impl RunHost {
    pub fn new(
        driver: Arc<dyn DaqDriver>,
        known_samples: Vec<String>,
        temp: TempStore,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            driver,
            known_samples,
            temp,
            events,
            queue: Mutex::new(VecDeque::new()),
            active: Mutex::new(None),
            abort_next: AtomicBool::new(false),
            run_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Build a host from loaded configuration, wiping the temp directory.
    pub fn from_config(
        driver: Arc<dyn DaqDriver>,
        config: &AppConfig,
    ) -> Result<Self, AcquisitionError> {
        let temp = TempStore::new(config.host.temp_directory.clone())?;
        Ok(Self::new(
            driver,
            config.samples.clone(),
            temp,
            config.host.event_capacity,
        ))
    }

    pub fn driver(&self) -> &Arc<dyn DaqDriver> {
        &self.driver
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp.root()
    }

    /// Live stream of run events. Slow subscribers may lag and skip events;
    /// the results file is the durable record.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    /// Validate `params` and queue an acquisition run.
    pub fn queue(&self, params: RunParameters) -> Result<u64, AcquisitionError> {
        params.validate(&self.known_samples).inspect_err(|err| {
            log_acquisition_error(err, "queue");
        })?;
        let procedure = AcquisitionProcedure::new(params, Arc::clone(&self.driver));
        Ok(self.queue_procedure(Box::new(procedure)))
    }

    /// Queue any procedure; the host only relies on the lifecycle hooks.
    pub fn queue_procedure(&self, procedure: Box<dyn Procedure>) -> u64 {
        let run_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock_queue().push_back(QueuedRun { run_id, procedure });
        info!("Queued run {}", run_id);
        self.publish(RunEvent::Queued { run_id });
        run_id
    }

    pub fn pending(&self) -> usize {
        self.lock_queue().len()
    }

    /// Drop queued runs that have not started; returns how many were removed.
    pub fn clear_queue(&self) -> usize {
        let mut queue = self.lock_queue();
        let removed = queue.len();
        queue.clear();
        self.abort_next.store(false, Ordering::SeqCst);
        removed
    }

    /// Cancel the active run.
    ///
    /// With no run active but runs queued, the next run to start is
    /// cancelled before it touches hardware.
    ///
    /// # Returns
    /// `true` if a run has been signalled
    pub fn abort(&self) -> bool {
        let active = self.lock_active();
        if let Some(cancel) = active.as_ref() {
            warn!("Abort requested");
            cancel.cancel();
            return true;
        }
        let queue = self.lock_queue();
        if !queue.is_empty() {
            warn!("Abort requested before the next run started");
            self.abort_next.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    pub fn is_running(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Run the next queued procedure to completion.
    pub fn run_next(&self) -> Option<RunReport> {
        let _serial = self
            .run_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Pop and publish the token under the active lock so an abort always
        // finds either the queued run or its token
        let (run, cancel) = {
            let mut active = self.lock_active();
            let run = self.lock_queue().pop_front()?;
            let cancel = CancelToken::new();
            if self.abort_next.swap(false, Ordering::SeqCst) {
                cancel.cancel();
            }
            *active = Some(cancel.clone());
            (run, cancel)
        };
        Some(self.execute_run(run, cancel))
    }

    /// Run every queued procedure in order.
    pub fn run_queue(&self) -> Vec<RunReport> {
        let mut reports = Vec::new();
        while let Some(report) = self.run_next() {
            reports.push(report);
        }
        reports
    }

    /// Drain the queue on a worker thread.
    pub fn spawn_queue(self: &Arc<Self>) -> JoinHandle<Vec<RunReport>> {
        let host = Arc::clone(self);
        std::thread::spawn(move || host.run_queue())
    }

    fn execute_run(&self, mut run: QueuedRun, cancel: CancelToken) -> RunReport {
        let path = self.temp.file_for(run.run_id);
        info!("Run {} started, writing to {}", run.run_id, path.display());

        let (outcome, emitted, file_written) =
            self.drive(run.run_id, run.procedure.as_mut(), &cancel, &path);

        if let Err(err) = run.procedure.shutdown() {
            log_acquisition_error(&err, "shutdown");
        }
        *self.lock_active() = None;

        match &outcome {
            RunOutcome::Completed => info!("Run {} completed with {} samples", run.run_id, emitted),
            RunOutcome::Cancelled => warn!("Run {} cancelled after {} samples", run.run_id, emitted),
            RunOutcome::Failed { message, .. } => {
                warn!("Run {} failed after {} samples: {}", run.run_id, emitted, message)
            }
        }

        let report = RunReport {
            run_id: run.run_id,
            path: file_written.then_some(path),
            outcome,
            emitted,
            metadata: owned_entries(run.procedure.metadata_entries()),
        };
        self.publish(report.final_event());
        report
    }

    /// Startup, results file, execute. Returns (outcome, emitted, file written).
    fn drive(
        &self,
        run_id: u64,
        procedure: &mut dyn Procedure,
        cancel: &CancelToken,
        path: &Path,
    ) -> (RunOutcome, usize, bool) {
        let startup = procedure.startup(cancel);

        let writer = match ResultsWriter::create(path, &*procedure) {
            Ok(writer) => writer,
            Err(err) => {
                log_acquisition_error(&err, "create_results");
                let err = startup.err().unwrap_or(err);
                return (RunOutcome::failed(&err), 0, false);
            }
        };

        match startup {
            Err(err) => return (RunOutcome::failed(&err), 0, true),
            Ok(StepOutcome::Cancelled { .. }) => return (RunOutcome::Cancelled, 0, true),
            Ok(StepOutcome::Completed { .. }) => {}
        }

        self.publish(RunEvent::Started {
            run_id,
            metadata: owned_entries(procedure.metadata_entries()),
        });

        let mut sink = HostSink {
            run_id,
            writer,
            events: &self.events,
            emitted: 0,
        };
        let result = procedure.execute(cancel, &mut sink);
        let emitted = sink.emitted;
        let finished = sink.writer.finish();

        let outcome = match (result, finished) {
            (Err(err), _) | (Ok(_), Err(err)) => RunOutcome::failed(&err),
            (Ok(StepOutcome::Cancelled { .. }), Ok(_)) => RunOutcome::Cancelled,
            (Ok(StepOutcome::Completed { .. }), Ok(_)) => RunOutcome::Completed,
        };
        (outcome, emitted, true)
    }

    fn publish(&self, event: RunEvent) {
        // No subscribers is fine; the results file is the record
        let _ = self.events.send(event);
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<QueuedRun>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<CancelToken>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Writes each point to disk, then republishes it live.
struct HostSink<'a> {
    run_id: u64,
    writer: ResultsWriter,
    events: &'a broadcast::Sender<RunEvent>,
    emitted: usize,
}

impl SampleSink for HostSink<'_> {
    fn emit(&mut self, point: SamplePoint) -> Result<(), AcquisitionError> {
        self.writer.append(&point)?;
        self.emitted += 1;
        let _ = self.events.send(RunEvent::Sample {
            run_id: self.run_id,
            point,
        });
        Ok(())
    }
}

fn owned_entries(entries: Vec<(&'static str, String)>) -> Vec<(String, String)> {
    entries
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect()
}
