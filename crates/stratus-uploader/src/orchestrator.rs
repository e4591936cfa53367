//! Facade tying the validator, tracker, limiter, pipeline runner and completion
//! signaler together.
//!
//! All mutable state sits behind one mutex that is never held across an
//! `.await`. Observer events are queued while that lock is held and delivered by
//! a single dispatcher task, so callbacks arrive in the order the state changed.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use stratus_core::models::{CompletedUpload, Rejection, UploadFile, UploadResult, UploadTask};
use stratus_core::{validate_file, StageError, UploadBackend, UploadConfig, UploadError, UploadObserver};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::completion::CompletionSignaler;
use crate::limiter::ConcurrencyLimiter;
use crate::notification::UploadNotification;
use crate::pipeline::PipelineRunner;
use crate::tracker::StateTracker;

/// Outcome of one `submit` call.
#[derive(Debug, Clone)]
pub struct SubmitReport {
    pub batch_id: Uuid,
    /// Ids of the tasks created, in submission order.
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<Rejection>,
}

/// Point-in-time copy of the orchestrator state, published on every change.
#[derive(Debug, Clone, Default)]
pub struct UploadSnapshot {
    pub tasks: Vec<UploadTask>,
    pub is_uploading: bool,
    pub notification_visible: bool,
}

impl UploadSnapshot {
    pub fn notification(&self) -> UploadNotification {
        UploadNotification::from_tasks(&self.tasks, self.notification_visible)
    }

    /// No task is pending or uploading.
    pub fn is_idle(&self) -> bool {
        self.tasks.iter().all(UploadTask::is_terminal)
    }
}

struct Job {
    folder_id: Option<String>,
    cancel: CancellationToken,
}

struct State {
    tracker: StateTracker,
    limiter: ConcurrencyLimiter,
    signaler: CompletionSignaler,
    /// Tasks that have not finished yet.
    jobs: HashMap<Uuid, Job>,
    cleanup: Option<JoinHandle<()>>,
    cleanup_generation: u64,
    visible: bool,
    /// Tasks as they stood when the last set of uploads finished.
    settled: Vec<UploadTask>,
}

impl State {
    fn new(max_concurrent_uploads: usize) -> Self {
        Self {
            tracker: StateTracker::new(),
            limiter: ConcurrencyLimiter::new(max_concurrent_uploads),
            signaler: CompletionSignaler::new(),
            jobs: HashMap::new(),
            cleanup: None,
            cleanup_generation: 0,
            visible: false,
            settled: Vec::new(),
        }
    }

    fn cancel_cleanup(&mut self) {
        if let Some(handle) = self.cleanup.take() {
            handle.abort();
        }
        self.cleanup_generation += 1;
    }
}

enum Event {
    Started(Vec<UploadTask>),
    Progress(Uuid, u8),
    Completed(Uuid, UploadResult),
    Failed(Uuid, String),
    AllComplete(Vec<CompletedUpload>),
}

impl Event {
    fn deliver(self, observer: &dyn UploadObserver) {
        match self {
            Event::Started(tasks) => observer.on_upload_start(&tasks),
            Event::Progress(task_id, progress) => observer.on_upload_progress(task_id, progress),
            Event::Completed(task_id, result) => observer.on_upload_complete(task_id, &result),
            Event::Failed(task_id, error) => observer.on_upload_error(task_id, &error),
            Event::AllComplete(completed) => observer.on_all_uploads_complete(&completed),
        }
    }
}

struct Inner {
    config: UploadConfig,
    runner: PipelineRunner,
    observer: Arc<dyn UploadObserver>,
    state: Mutex<State>,
    snapshot_tx: watch::Sender<UploadSnapshot>,
    events_tx: mpsc::UnboundedSender<Event>,
    /// Taken by the dispatcher task on the first submission.
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

/// Cheap to clone; every clone drives the same uploads.
#[derive(Clone)]
pub struct UploadOrchestrator {
    inner: Arc<Inner>,
}

impl UploadOrchestrator {
    pub fn new(
        config: UploadConfig,
        backend: Arc<dyn UploadBackend>,
        observer: Arc<dyn UploadObserver>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let state = State::new(config.max_concurrent_uploads);
        let (snapshot_tx, _) = watch::channel(UploadSnapshot::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                runner: PipelineRunner::new(backend),
                observer,
                state: Mutex::new(state),
                snapshot_tx,
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        })
    }

    /// Validate `files`, queue the accepted ones and start as many pipelines as
    /// the concurrency limit allows. Must be called from within a tokio runtime.
    ///
    /// `folder_id` is the destination folder for the whole batch; `None` uploads
    /// into the user's root folder.
    pub fn submit(&self, files: Vec<UploadFile>, folder_id: Option<String>) -> SubmitReport {
        let batch_id = Uuid::new_v4();
        let mut tasks = Vec::with_capacity(files.len());
        let mut rejected = Vec::new();

        for file in files {
            match validate_file(&file, &self.inner.config) {
                Ok(()) => tasks.push(UploadTask::pending(batch_id, file)),
                Err(reason) => {
                    tracing::warn!(
                        batch_id = %batch_id,
                        file = %file.name,
                        error = %reason,
                        "File rejected"
                    );
                    rejected.push(Rejection {
                        file_name: file.name,
                        reason,
                    });
                }
            }
        }

        let report = SubmitReport {
            batch_id,
            accepted: tasks.iter().map(|t| t.id).collect(),
            rejected,
        };
        if tasks.is_empty() {
            return report;
        }

        let folder_id = folder_id.filter(|id| !id.trim().is_empty());
        self.inner.start_dispatcher();
        {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            state.cancel_cleanup();
            state.visible = true;
            state.signaler.tasks_added(tasks.len());
            for task in &tasks {
                state.limiter.enqueue(task.id);
                state.jobs.insert(
                    task.id,
                    Job {
                        folder_id: folder_id.clone(),
                        cancel: CancellationToken::new(),
                    },
                );
            }
            state.tracker.insert(tasks.clone());
            self.inner.publish(state);
            self.inner.emit(Event::Started(tasks));
        }

        tracing::info!(
            batch_id = %batch_id,
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "Upload batch queued"
        );

        self.inner.drain();
        report
    }

    pub fn tasks(&self) -> Vec<UploadTask> {
        self.inner.lock().tracker.tasks().to_vec()
    }

    pub fn task(&self, task_id: Uuid) -> Option<UploadTask> {
        self.inner.lock().tracker.get(task_id).cloned()
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Receiver that sees every published snapshot (or at least the latest).
    pub fn subscribe(&self) -> watch::Receiver<UploadSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// True while at least one pipeline is running.
    pub fn is_uploading(&self) -> bool {
        self.inner.lock().tracker.is_uploading()
    }

    pub fn notification(&self) -> UploadNotification {
        let state = self.inner.lock();
        UploadNotification::from_tasks(state.tracker.tasks(), state.visible)
    }

    /// Hide the notification and drop finished tasks right away. Pending and
    /// uploading tasks are kept.
    pub fn dismiss(&self) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.cancel_cleanup();
        state.visible = false;
        let removed = state.tracker.remove_terminal();
        tracing::debug!(removed, "Upload notification dismissed");
        self.inner.publish(state);
    }

    /// Stop an unfinished task. A running pipeline is aborted; a pending task
    /// fails as soon as it gets a slot. Returns false for unknown or finished
    /// tasks.
    pub fn cancel(&self, task_id: Uuid) -> bool {
        let state = self.inner.lock();
        match state.jobs.get(&task_id) {
            Some(job) => {
                job.cancel.cancel();
                tracing::info!(task_id = %task_id, "Upload cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Resolves once no task is pending or uploading and returns the tasks of
    /// the most recently finished set, as they stood when it finished. The
    /// result does not depend on whether cleanup or `dismiss` already ran.
    pub async fn wait_idle(&self) -> Vec<UploadTask> {
        let mut rx = self.inner.snapshot_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(UploadSnapshot::is_idle).await;
        self.inner.lock().settled.clone()
    }

    pub fn config(&self) -> &UploadConfig {
        &self.inner.config
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &State) {
        self.snapshot_tx.send_replace(UploadSnapshot {
            tasks: state.tracker.tasks().to_vec(),
            is_uploading: state.tracker.is_uploading(),
            notification_visible: state.visible,
        });
    }

    /// Queue an observer event. Call with the state lock held so the queue
    /// order matches the order of state changes.
    fn emit(&self, event: Event) {
        if self.events_tx.send(event).is_err() {
            tracing::warn!("Observer dispatcher is gone, event dropped");
        }
    }

    fn start_dispatcher(&self) {
        let receiver = self
            .events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut receiver) = receiver else {
            return;
        };
        let observer = Arc::clone(&self.observer);

        // Ends when the orchestrator and its pipelines are gone.
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if catch_unwind(AssertUnwindSafe(|| event.deliver(observer.as_ref()))).is_err() {
                    tracing::error!("Upload observer panicked");
                }
            }
        });
    }

    /// Move queued tasks to `uploading` while slots are free and spawn their
    /// pipelines.
    fn drain(self: &Arc<Self>) {
        let mut started = Vec::new();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            while let Some(task_id) = state.limiter.try_start() {
                let file = match state.tracker.get(task_id) {
                    Some(task) => task.file.clone(),
                    None => {
                        tracing::warn!(task_id = %task_id, "Queued upload is no longer tracked");
                        state.limiter.release();
                        state.jobs.remove(&task_id);
                        continue;
                    }
                };
                if let Err(e) = state.tracker.start(task_id) {
                    tracing::warn!(error = %e, "Could not start upload");
                    state.limiter.release();
                    continue;
                }
                let (folder_id, cancel) = state
                    .jobs
                    .get(&task_id)
                    .map(|job| (job.folder_id.clone(), job.cancel.clone()))
                    .unwrap_or_default();
                started.push((task_id, file, folder_id, cancel));
            }

            if !started.is_empty() {
                self.publish(state);
            }
        }

        for (task_id, file, folder_id, cancel) in started {
            self.spawn_pipeline(task_id, file, folder_id, cancel);
        }
    }

    fn spawn_pipeline(
        self: &Arc<Self>,
        task_id: Uuid,
        file: UploadFile,
        folder_id: Option<String>,
        cancel: CancellationToken,
    ) {
        let inner = Arc::clone(self);
        let span = tracing::info_span!("upload", task_id = %task_id);

        tokio::spawn(async move {
            let runner = inner.runner.clone();
            let timeout = inner.config.upload_timeout;
            let progress = Arc::clone(&inner);

            // Nested so a panicking pipeline still frees its slot.
            let pipeline = tokio::spawn(
                async move {
                    runner
                        .run_guarded(&file, folder_id.as_deref(), timeout, &cancel, move |p| {
                            progress.report_progress(task_id, p)
                        })
                        .await
                }
                .instrument(span),
            );

            let outcome = match pipeline.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(task_id = %task_id, error = %e, "Upload pipeline aborted");
                    Err(UploadError::from(StageError::Internal(e.to_string())))
                }
            };
            inner.finish(task_id, outcome);
        });
    }

    fn report_progress(&self, task_id: Uuid, progress: u8) {
        let mut state = self.lock();
        if let Some(progress) = state.tracker.update_progress(task_id, progress) {
            self.publish(&state);
            self.emit(Event::Progress(task_id, progress));
        }
    }

    fn finish(self: &Arc<Self>, task_id: Uuid, outcome: Result<UploadResult, UploadError>) {
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            state.limiter.release();
            state.jobs.remove(&task_id);

            match outcome {
                Ok(result) => match state.tracker.complete(task_id, result.clone()) {
                    Ok(()) => {
                        tracing::info!(task_id = %task_id, cdn_url = %result.cdn_url, "Upload completed");
                        state.signaler.record_completed(task_id, &result.filename);
                        self.emit(Event::Progress(task_id, 100));
                        self.emit(Event::Completed(task_id, result));
                    }
                    Err(e) => tracing::warn!(error = %e, "Dropped upload result"),
                },
                Err(err) => {
                    let message = err.to_string();
                    match state.tracker.fail(task_id, message.clone()) {
                        Ok(()) => self.emit(Event::Failed(task_id, message)),
                        Err(e) => tracing::warn!(error = %e, "Dropped upload failure"),
                    }
                }
            }

            if let Some(completed) = state.signaler.check(state.tracker.all_terminal()) {
                tracing::info!(
                    completed = completed.len(),
                    total = state.tracker.len(),
                    "All uploads finished"
                );
                state.settled = state.tracker.tasks().to_vec();
                self.emit(Event::AllComplete(completed));
                self.schedule_cleanup(state);
            }

            self.publish(state);
        }

        self.drain();
    }

    fn schedule_cleanup(self: &Arc<Self>, state: &mut State) {
        state.cancel_cleanup();
        let generation = state.cleanup_generation;
        let grace = self.config.cleanup_grace;
        let inner: Weak<Inner> = Arc::downgrade(self);

        state.cleanup = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inner) = inner.upgrade() {
                inner.run_cleanup(generation);
            }
        }));
    }

    fn run_cleanup(&self, generation: u64) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.cleanup_generation != generation || !state.tracker.all_terminal() {
            return;
        }
        state.cleanup = None;
        state.visible = false;
        let removed = state.tracker.remove_terminal();
        tracing::debug!(removed, "Cleared finished uploads");
        self.publish(state);
    }
}
