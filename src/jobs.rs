// ============================================================================
// BACKGROUND JOBS — request-id tagged work on the rayon pool
// ============================================================================
//
// Every submission belongs to a job class (layer + operation). Ids are issued
// from one monotonic counter and the dispatcher remembers the newest id per
// class; when a result arrives for an older id it is dropped without being
// surfaced. Jobs own their input buffers, so a failed or superseded job can
// never touch the caller's state.
// ============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc;

use uuid::Uuid;

use crate::error::{EditorError, Result};
use crate::{log_err, log_info};

pub type RequestId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Curves,
    Filter,
    Resize,
    Composite,
    Render,
    Export,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Curves => "curves",
            OperationKind::Filter => "filter",
            OperationKind::Resize => "resize",
            OperationKind::Composite => "composite",
            OperationKind::Render => "render",
            OperationKind::Export => "export",
        }
    }
}

/// Jobs in the same class supersede each other. `layer` is `None` for
/// document-wide work such as rendering or export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JobClass {
    pub layer: Option<Uuid>,
    pub kind: OperationKind,
}

impl JobClass {
    pub fn new(layer: Option<Uuid>, kind: OperationKind) -> Self {
        Self { layer, kind }
    }

    pub fn document(kind: OperationKind) -> Self {
        Self { layer: None, kind }
    }
}

#[derive(Debug)]
pub enum JobOutcome<T> {
    Completed {
        request_id: RequestId,
        class: JobClass,
        value: T,
    },
    Failed {
        request_id: RequestId,
        class: JobClass,
        error: EditorError,
    },
}

impl<T> JobOutcome<T> {
    pub fn request_id(&self) -> RequestId {
        match self {
            JobOutcome::Completed { request_id, .. } | JobOutcome::Failed { request_id, .. } => *request_id,
        }
    }

    pub fn class(&self) -> JobClass {
        match self {
            JobOutcome::Completed { class, .. } | JobOutcome::Failed { class, .. } => *class,
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            JobOutcome::Completed { value, .. } => Ok(value),
            JobOutcome::Failed { error, .. } => Err(error),
        }
    }
}

/// What a worker sends back over the channel.
struct JobMessage<T> {
    request_id: RequestId,
    class: JobClass,
    result: Result<T>,
}

pub struct JobDispatcher<T: Send + 'static> {
    sender: mpsc::Sender<JobMessage<T>>,
    receiver: mpsc::Receiver<JobMessage<T>>,
    next_id: RequestId,
    latest: HashMap<JobClass, RequestId>,
    pending: usize,
    /// Outcomes received while `run_blocking` waited for a different request.
    held: VecDeque<JobOutcome<T>>,
}

impl<T: Send + 'static> Default for JobDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> JobDispatcher<T> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            next_id: 0,
            latest: HashMap::new(),
            pending: 0,
            held: VecDeque::new(),
        }
    }

    /// Number of submitted jobs whose message has not been received yet,
    /// stale ones included.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn latest_request(&self, class: JobClass) -> Option<RequestId> {
        self.latest.get(&class).copied()
    }

    pub fn is_latest(&self, class: JobClass, request_id: RequestId) -> bool {
        self.latest.get(&class) == Some(&request_id)
    }

    /// Issue a new id for `class`, superseding anything still in flight for it.
    fn issue(&mut self, class: JobClass) -> RequestId {
        self.next_id = self.next_id.wrapping_add(1);
        self.latest.insert(class, self.next_id);
        self.next_id
    }

    /// Run `job` on the rayon pool. Panics are caught and reported as failures.
    pub fn submit<F>(&mut self, class: JobClass, job: F) -> RequestId
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let request_id = self.issue(class);
        let sender = self.sender.clone();
        self.pending += 1;

        rayon::spawn(move || {
            let result = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
                Ok(result) => result,
                Err(panic_info) => {
                    let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.to_string()
                    } else {
                        "unknown panic payload".to_string()
                    };
                    Err(EditorError::Job(format!("{} job panicked: {}", class.kind.name(), msg)))
                }
            };
            // Receiver gone means the dispatcher was dropped; nothing to report to
            let _ = sender.send(JobMessage { request_id, class, result });
        });

        request_id
    }

    /// Forget the newest id for `class` so whatever is in flight arrives stale.
    pub fn cancel(&mut self, class: JobClass) {
        if self.latest.remove(&class).is_some() {
            log_info!("Cancelled pending {} job", class.kind.name());
        }
    }

    /// Turn a received message into an outcome, or `None` when superseded.
    fn accept(&mut self, msg: JobMessage<T>) -> Option<JobOutcome<T>> {
        self.pending = self.pending.saturating_sub(1);
        if !self.is_latest(msg.class, msg.request_id) {
            return None;
        }
        Some(match msg.result {
            Ok(value) => JobOutcome::Completed {
                request_id: msg.request_id,
                class: msg.class,
                value,
            },
            Err(error) => {
                log_err!("Job #{} ({}) failed: {}", msg.request_id, msg.class.kind.name(), error);
                JobOutcome::Failed {
                    request_id: msg.request_id,
                    class: msg.class,
                    error,
                }
            }
        })
    }

    /// Outcomes held back by `run_blocking` that are still current.
    fn take_held(&mut self) -> Vec<JobOutcome<T>> {
        let held: Vec<JobOutcome<T>> = self.held.drain(..).collect();
        held.into_iter()
            .filter(|o| self.is_latest(o.class(), o.request_id()))
            .collect()
    }

    /// Drain everything that has arrived, without blocking.
    pub fn poll(&mut self) -> Vec<JobOutcome<T>> {
        let mut out = self.take_held();
        while let Ok(msg) = self.receiver.try_recv() {
            if let Some(outcome) = self.accept(msg) {
                out.push(outcome);
            }
        }
        out
    }

    /// Block until every pending job has reported.
    pub fn wait_all(&mut self) -> Vec<JobOutcome<T>> {
        let mut out = self.take_held();
        while self.pending > 0 {
            // The dispatcher owns a sender, so recv only fails if a worker vanished
            let Ok(msg) = self.receiver.recv() else { break };
            if let Some(outcome) = self.accept(msg) {
                out.push(outcome);
            }
        }
        out
    }

    /// Submit and wait for this one request. Used by the headless pipeline.
    /// Outcomes for other requests that arrive meanwhile are kept for the
    /// next `poll` or `wait_all`.
    pub fn run_blocking<F>(&mut self, class: JobClass, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let id = self.submit(class, job);
        loop {
            let Ok(msg) = self.receiver.recv() else {
                return Err(EditorError::Job(format!(
                    "{} job #{} did not report back",
                    class.kind.name(),
                    id
                )));
            };
            let Some(outcome) = self.accept(msg) else { continue };
            if outcome.request_id() == id {
                return outcome.into_result();
            }
            self.held.push_back(outcome);
        }
    }
}

// ============================================================================
// RENDER SCHEDULER — at most one render in flight, latest request wins
// ============================================================================

/// Collapses bursts of render requests into one pass per frame. While a
/// frame is in flight new requests replace the pending one; when the frame
/// finishes the newest pending request is rendered next.
#[derive(Debug)]
pub struct RenderScheduler<T> {
    pending: Option<T>,
    in_flight: bool,
    requests: u64,
    frames: u64,
}

impl<T> Default for RenderScheduler<T> {
    fn default() -> Self {
        Self {
            pending: None,
            in_flight: false,
            requests: 0,
            frames: 0,
        }
    }
}

impl<T> RenderScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_render(&mut self, request: T) {
        self.requests += 1;
        self.pending = Some(request);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_rendering(&self) -> bool {
        self.in_flight
    }

    /// Start a frame if one is wanted and none is running.
    pub fn begin_frame(&mut self) -> Option<T> {
        if self.in_flight {
            return None;
        }
        let request = self.pending.take()?;
        self.in_flight = true;
        self.frames += 1;
        Some(request)
    }

    pub fn finish_frame(&mut self) {
        self.in_flight = false;
    }

    /// A failed frame also drops whatever was queued behind it.
    pub fn abort_frame(&mut self) {
        self.in_flight = false;
        self.pending = None;
    }

    /// Total `request_render` calls and frames actually started.
    pub fn stats(&self) -> (u64, u64) {
        (self.requests, self.frames)
    }
}
