use futures::future::join_all;
use std::{fmt, sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use vigil_model::{InspectionResults, ScannerPayload, subjects};

use super::{
    ChainClient, InspectionError, InspectionRoutine, InspectionSettings,
    PendingSlot, TriggerOutcome, WatchdogClock,
};
use crate::{
    CoreError,
    bus::{BusError, MessageBus, MessageBusExt, json_handler},
    health::{ErrorTracker, HealthReport, HealthReporter},
};

const HEALTH_NAME: &str = "inspector";
const LAST_ERROR_REPORT: &str = "last-error";
const TASK_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Turns block progress into inspections of the node's data pipeline.
pub struct InspectionScheduler {
    settings: InspectionSettings,
    routine: Arc<dyn InspectionRoutine>,
    chain: Arc<dyn ChainClient>,
    bus: Arc<dyn MessageBus>,
    slot: PendingSlot,
    clock: WatchdogClock,
    tracker: ErrorTracker,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for InspectionScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tasks = self.tasks.try_lock().map(|tasks| tasks.len()).ok();

        f.debug_struct("InspectionScheduler")
            .field("cadence", &self.settings.cadence)
            .field("check_trace", &self.settings.check_trace)
            .field("slot", &self.slot)
            .field("silent_for", &self.clock.silent_for())
            .field("last_error", &self.tracker.last_error())
            .field("tasks", &tasks)
            .finish()
    }
}

impl InspectionScheduler {
    /// Builds an idle scheduler. Nothing runs until [`Self::start`].
    pub fn new(
        settings: InspectionSettings,
        routine: Arc<dyn InspectionRoutine>,
        chain: Arc<dyn ChainClient>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            settings,
            routine,
            chain,
            bus,
            slot: PendingSlot::new(),
            clock: WatchdogClock::new(),
            tracker: ErrorTracker::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Effective settings the scheduler was built with.
    pub fn settings(&self) -> &InspectionSettings {
        &self.settings
    }

    /// Subscribes to block progress and spawns the watchdog and the worker.
    ///
    /// When inspection is disabled nothing is started and `Ok(false)` is
    /// returned.
    pub async fn start(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> Result<bool, CoreError> {
        if !self.settings.enabled {
            warn!(
                target: "inspection",
                "inspection is disabled in this mode - not starting the inspector"
            );
            return Ok(false);
        }

        let receiver = self
            .slot
            .take_receiver()
            .await
            .ok_or(InspectionError::AlreadyStarted)?;

        self.register_handlers().await?;

        let worker = tokio::spawn(
            Arc::clone(self).run_worker(receiver, shutdown.clone()),
        );
        let watchdog =
            tokio::spawn(Arc::clone(self).run_watchdog(shutdown.clone()));
        self.tasks.lock().await.extend([worker, watchdog]);

        info!(
            target: "inspection",
            cadence = self.settings.cadence,
            check_trace = self.settings.check_trace,
            network_saving_mode = self.settings.network_saving_mode,
            "inspector started"
        );
        Ok(true)
    }

    /// Waits for the spawned loops to exit. The caller cancels the token
    /// passed to [`start`](Self::start) first.
    pub async fn shutdown(&self) {
        let handles = {
            let mut guard = self.tasks.lock().await;
            std::mem::take(&mut *guard)
        };

        let joined = join_all(handles.into_iter().map(|handle| {
            tokio::time::timeout(TASK_SHUTDOWN_GRACE, handle)
        }))
        .await;

        for result in joined {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(target: "inspection", "inspector task failed: {err:?}")
                }
                Err(_) => warn!(
                    target: "inspection",
                    "inspector task timed out during shutdown"
                ),
            }
        }
    }

    async fn register_handlers(self: &Arc<Self>) -> Result<(), BusError> {
        let scheduler = Arc::clone(self);
        self.bus
            .subscribe(
                subjects::SCANNER_BLOCK,
                json_handler(move |payload: ScannerPayload| {
                    let scheduler = Arc::clone(&scheduler);
                    async move {
                        scheduler.handle_block_progress(&payload);
                        Ok::<(), CoreError>(())
                    }
                }),
            )
            .await
    }

    /// Offers `block` to the pending slot without waiting.
    pub fn try_trigger(&self, block: u64) -> TriggerOutcome {
        let outcome = self.slot.offer(block);
        match outcome {
            TriggerOutcome::Queued => {
                debug!(target: "inspection", triggered_at_block = block, "inspection queued")
            }
            TriggerOutcome::Busy => info!(
                target: "inspection",
                triggered_at_block = block,
                "already busy - skipping inspection trigger"
            ),
            TriggerOutcome::Closed => warn!(
                target: "inspection",
                triggered_at_block = block,
                "inspection worker is gone - dropping trigger"
            ),
        }
        outcome
    }

    /// Records a block-progress signal and queues an inspection when the
    /// block lands on the cadence.
    pub fn handle_block_progress(
        &self,
        payload: &ScannerPayload,
    ) -> Option<TriggerOutcome> {
        self.clock.signal();

        let latest = payload.latest_block_input;
        let target = self.settings.target_block(latest)?;
        info!(
            target: "inspection",
            latest_block = latest,
            inspecting_at_block = target,
            "block progress reached inspection cadence"
        );
        Some(self.try_trigger(target))
    }

    /// One watchdog pass. Does nothing while block progress keeps arriving.
    pub async fn watchdog_tick(&self) -> Option<TriggerOutcome> {
        if !self.clock.is_silent(self.settings.silence_threshold) {
            return None;
        }

        let probe = tokio::time::timeout(
            self.settings.probe_timeout,
            self.chain.block_number(),
        )
        .await;

        let block = match probe {
            Ok(Ok(block)) if self.settings.is_inspection_block(block) => block,
            Ok(Ok(block)) => {
                debug!(target: "inspection", block, "watchdog: block is off cadence");
                return None;
            }
            Ok(Err(err)) => {
                warn!(
                    target: "inspection",
                    error = %err,
                    "watchdog: failed to read block number - inspecting block 0"
                );
                0
            }
            Err(_) => {
                warn!(
                    target: "inspection",
                    timeout = ?self.settings.probe_timeout,
                    "watchdog: chain rpc did not answer - inspecting block 0"
                );
                0
            }
        };

        Some(self.try_trigger(block))
    }

    /// Removes the pending block, for callers that drive the scheduler
    /// without starting its worker.
    pub async fn take_pending(&self) -> Option<u64> {
        self.slot.try_take().await
    }

    /// Runs the inspection for `block` with retry and publishes the results.
    pub async fn inspect_block(
        &self,
        block: u64,
        shutdown: &CancellationToken,
    ) -> Result<(), InspectionError> {
        let (results, outcome) = self.inspect_with_retry(block, shutdown).await;

        if let Some(results) = results {
            self.publish_results(&results).await;
        }

        match &outcome {
            Ok(()) => {
                info!(target: "inspection", inspecting_at_block = block, "inspection done");
                self.tracker.track_error::<InspectionError>(None);
            }
            Err(InspectionError::Cancelled) => {
                debug!(target: "inspection", inspecting_at_block = block, "inspection cancelled");
            }
            Err(err) => {
                error!(
                    target: "inspection",
                    inspecting_at_block = block,
                    error = %err,
                    "inspection failed"
                );
                self.tracker.track_error(Some(err));
            }
        }
        outcome
    }

    async fn inspect_with_retry(
        &self,
        block: u64,
        shutdown: &CancellationToken,
    ) -> (Option<InspectionResults>, Result<(), InspectionError>) {
        let inputs = self.settings.inputs_for(block);
        let retry = self.settings.retry;
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            debug!(target: "inspection", inspecting_at_block = block, attempt = attempts, "inspection attempt");

            let attempt = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    return (None, Err(InspectionError::Cancelled));
                }
                res = tokio::time::timeout(
                    self.settings.attempt_timeout,
                    self.routine.inspect(&inputs),
                ) => res,
            };

            let (results, err) = match attempt {
                Ok(outcome) => match outcome.error {
                    None => return (outcome.results, Ok(())),
                    Some(err) => (outcome.results, err),
                },
                Err(_) => {
                    (None, InspectionError::Timeout(self.settings.attempt_timeout))
                }
            };

            let elapsed = started.elapsed();
            let Some(delay) = retry.next_delay(attempts, elapsed) else {
                return (
                    results,
                    Err(InspectionError::Exhausted {
                        attempts,
                        elapsed,
                        last: err.to_string(),
                    }),
                );
            };

            warn!(
                target: "inspection",
                inspecting_at_block = block,
                attempt = attempts,
                retry_in = ?delay,
                error = %err,
                "inspection attempt failed"
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    return (None, Err(InspectionError::Cancelled));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn publish_results(&self, results: &InspectionResults) {
        if let Err(err) =
            self.bus.publish_json(subjects::INSPECTION_DONE, results).await
        {
            warn!(
                target: "inspection",
                inspecting_at_block = results.inputs.block_number,
                error = %err,
                "failed to publish inspection results"
            );
        }
    }

    async fn run_worker(
        self: Arc<Self>,
        mut receiver: mpsc::Receiver<u64>,
        shutdown: CancellationToken,
    ) {
        loop {
            let block = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(block) => block,
                    None => break,
                },
            };
            // Errors are logged and tracked inside.
            let _ = self.inspect_block(block, &shutdown).await;
        }
        debug!(target: "inspection", "inspection worker stopped");
    }

    async fn run_watchdog(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.watchdog_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.watchdog_tick().await;
                }
            }
        }
        debug!(target: "inspection", "watchdog stopped");
    }
}

impl HealthReporter for InspectionScheduler {
    fn name(&self) -> &str {
        HEALTH_NAME
    }

    fn health(&self) -> Vec<HealthReport> {
        vec![self.tracker.report(LAST_ERROR_REPORT)]
    }
}
