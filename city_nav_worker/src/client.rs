// Query correlator: the caller-side handle for one navigation worker.
//
// `NavClient` spawns a worker thread, sends it the serialized navigation data,
// and then tags every path query with a fresh `RequestId`. The client owns the
// pending-request table exclusively; the worker never tracks requests.
//
// The main loop never blocks on a worker:
// - `request_path()` posts a `FindPath` and returns the id immediately.
// - `poll()` drains replies non-blocking and turns each into a `NavEvent`,
//   matched by id regardless of arrival order.
// - A reply whose id is not pending (cancelled, already resolved, or never
//   sent by this client) is dropped with a debug log.
//
// For callers that do want to block (tests, tools, loading screens),
// `wait_ready()` and `wait_for()` wait with a caller-supplied timeout. Events
// they consume on the way (including `Ready` itself) are kept and returned by
// the next `poll()`, except the reply `wait_for` hands back directly, so
// nothing is lost by mixing the two styles.
//
// If the worker thread goes away, every request still pending resolves as
// `PathOutcome::Failed` so no caller waits on a reply that cannot come.
//
// One client per navigation domain; several clients (and so several worker
// threads) may run side by side.
//
// See also: `worker.rs` for the other end of the channel.

use std::collections::VecDeque;
use std::sync::mpsc::{RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use city_nav::{NavConfig, NavPath, NavigationData, Vec3};
use city_nav_protocol::{FromWorker, RequestId, ToWorker};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::worker::{WorkerHandle, spawn_worker, to_vec3, to_wire};

/// Failure message for requests still pending when the worker goes away.
pub const WORKER_GONE: &str = "Navigation worker disconnected";

/// Lifecycle of the worker as seen from the client.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerStatus {
    /// `Init` sent, no reply yet.
    Starting,
    Ready,
    /// The worker rejected its navigation data.
    Failed(String),
    /// The worker thread is gone.
    Disconnected,
}

/// How one path query ended.
#[derive(Clone, Debug, PartialEq)]
pub enum PathOutcome {
    Found(NavPath),
    /// The endpoints are not connected. A planning fact, not a fault.
    NoPath,
    /// The worker could not answer this query.
    Failed(String),
}

impl PathOutcome {
    pub fn path(&self) -> Option<&NavPath> {
        match self {
            PathOutcome::Found(path) => Some(path),
            PathOutcome::NoPath | PathOutcome::Failed(_) => None,
        }
    }
}

/// Something the worker reported, surfaced by `poll()`.
#[derive(Clone, Debug, PartialEq)]
pub enum NavEvent {
    Ready,
    InitFailed { message: String },
    Path {
        request_id: RequestId,
        outcome: PathOutcome,
    },
}

struct PendingRequest {
    sent_at: Instant,
}

pub struct NavClient {
    name: String,
    worker: WorkerHandle,
    status: WorkerStatus,
    pending: FxHashMap<RequestId, PendingRequest>,
    backlog: VecDeque<NavEvent>,
}

impl NavClient {
    /// Spawn a worker and send it `data`. The client starts in `Starting`;
    /// `poll()` reports `NavEvent::Ready` once the worker has loaded it.
    pub fn spawn(name: &str, data: &NavigationData, config: &NavConfig) -> Result<Self, ClientError> {
        let navigation_data = data.to_bytes()?;
        let config_json = config.to_json()?;
        Self::spawn_raw(name, navigation_data, config_json)
    }

    /// Spawn a worker with already-serialized navigation data.
    pub fn spawn_raw(
        name: &str,
        navigation_data: Vec<u8>,
        config_json: String,
    ) -> Result<Self, ClientError> {
        let worker = spawn_worker(name)?;
        worker.send(ToWorker::Init {
            navigation_data,
            config_json,
        })?;
        Ok(Self::attach(name, worker))
    }

    fn attach(name: &str, worker: WorkerHandle) -> Self {
        Self {
            name: name.to_string(),
            worker,
            status: WorkerStatus::Starting,
            pending: FxHashMap::default(),
            backlog: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> &WorkerStatus {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == WorkerStatus::Ready
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Post a path query. Allowed while the worker is still starting: the
    /// worker handles `Init` first because messages are processed in order.
    pub fn request_path(&mut self, start: Vec3, end: Vec3) -> Result<RequestId, ClientError> {
        match &self.status {
            WorkerStatus::Failed(message) => return Err(ClientError::NotReady(message.clone())),
            WorkerStatus::Disconnected => return Err(ClientError::WorkerGone),
            WorkerStatus::Starting | WorkerStatus::Ready => {}
        }
        let request_id = RequestId::next();
        let msg = ToWorker::FindPath {
            request_id,
            start: Some(to_wire(start)),
            end: Some(to_wire(end)),
        };
        if let Err(e) = self.worker.send(msg) {
            self.status = WorkerStatus::Disconnected;
            return Err(e);
        }
        self.pending.insert(
            request_id,
            PendingRequest {
                sent_at: Instant::now(),
            },
        );
        Ok(request_id)
    }

    /// Forget a pending request. The worker still finishes it; its reply is
    /// discarded when it arrives. Returns false if it was not pending.
    pub fn cancel(&mut self, request_id: RequestId) -> bool {
        let was_pending = self.pending.remove(&request_id).is_some();
        self.backlog.retain(|event| {
            !matches!(event, NavEvent::Path { request_id: id, .. } if *id == request_id)
        });
        was_pending
    }

    /// Drain all worker replies (non-blocking).
    pub fn poll(&mut self) -> Vec<NavEvent> {
        let mut events: Vec<NavEvent> = self.backlog.drain(..).collect();
        loop {
            match self.worker.try_recv() {
                Ok(reply) => events.extend(self.dispatch(reply)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    events.extend(self.worker_gone());
                    break;
                }
            }
        }
        events
    }

    /// Block until the worker reports readiness or failure.
    pub fn wait_ready(&mut self, timeout: Duration) -> Result<(), ClientError> {
        let deadline = Instant::now() + timeout;
        loop {
            match &self.status {
                WorkerStatus::Ready => return Ok(()),
                WorkerStatus::Failed(message) => return Err(ClientError::NotReady(message.clone())),
                WorkerStatus::Disconnected => return Err(ClientError::WorkerGone),
                WorkerStatus::Starting => {}
            }
            if let Some(event) = self.recv_until(deadline, timeout)? {
                self.backlog.push_back(event);
            }
        }
    }

    /// Block until `request_id` resolves.
    pub fn wait_for(&mut self, request_id: RequestId, timeout: Duration) -> Result<PathOutcome, ClientError> {
        let queued = self.backlog.iter().position(
            |event| matches!(event, NavEvent::Path { request_id: id, .. } if *id == request_id),
        );
        if let Some(NavEvent::Path { outcome, .. }) = queued.and_then(|pos| self.backlog.remove(pos)) {
            return Ok(outcome);
        }
        if !self.pending.contains_key(&request_id) {
            return Err(ClientError::UnknownRequest(request_id));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let event = match self.recv_until(deadline, timeout) {
                Ok(event) => event,
                Err(ClientError::WorkerGone) => {
                    // The caller hears about this request through the error.
                    self.backlog.retain(|event| {
                        !matches!(event, NavEvent::Path { request_id: id, .. } if *id == request_id)
                    });
                    return Err(ClientError::WorkerGone);
                }
                Err(e) => return Err(e),
            };
            match event {
                Some(NavEvent::Path {
                    request_id: id,
                    outcome,
                }) if id == request_id => return Ok(outcome),
                Some(NavEvent::InitFailed { message }) => {
                    self.backlog.push_back(NavEvent::InitFailed {
                        message: message.clone(),
                    });
                    return Err(ClientError::NotReady(message));
                }
                Some(event) => self.backlog.push_back(event),
                None => {}
            }
        }
    }

    /// Receive and dispatch one reply, waiting at most until `deadline`.
    fn recv_until(&mut self, deadline: Instant, timeout: Duration) -> Result<Option<NavEvent>, ClientError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ClientError::Timeout(timeout));
        }
        match self.worker.recv_timeout(remaining) {
            Ok(reply) => Ok(self.dispatch(reply)),
            Err(RecvTimeoutError::Timeout) => Err(ClientError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                let failed = self.worker_gone();
                self.backlog.extend(failed);
                Err(ClientError::WorkerGone)
            }
        }
    }

    /// Mark the worker disconnected and fail every pending request, in id
    /// order.
    fn worker_gone(&mut self) -> Vec<NavEvent> {
        if self.status != WorkerStatus::Disconnected {
            warn!(client = %self.name, pending = self.pending.len(), "navigation worker disconnected");
        }
        self.status = WorkerStatus::Disconnected;
        let mut ids: Vec<RequestId> = self.pending.drain().map(|(id, _)| id).collect();
        ids.sort_unstable();
        ids.into_iter()
            .map(|request_id| NavEvent::Path {
                request_id,
                outcome: PathOutcome::Failed(WORKER_GONE.to_string()),
            })
            .collect()
    }

    /// Update client state for one reply. Returns the event to surface, or
    /// `None` for a stale reply.
    fn dispatch(&mut self, reply: FromWorker) -> Option<NavEvent> {
        match reply {
            FromWorker::InitComplete => {
                let first = self.status != WorkerStatus::Ready;
                self.status = WorkerStatus::Ready;
                first.then_some(NavEvent::Ready)
            }
            FromWorker::WorkerError { message } => {
                self.status = WorkerStatus::Failed(message.clone());
                Some(NavEvent::InitFailed { message })
            }
            FromWorker::PathResult {
                request_id,
                path,
                path_length,
            } => {
                let outcome = match path {
                    Some(points) => PathOutcome::Found(NavPath {
                        points: points.into_iter().map(to_vec3).collect(),
                        length: path_length,
                    }),
                    None => PathOutcome::NoPath,
                };
                self.resolve(request_id, outcome)
            }
            FromWorker::PathError { request_id, error } => {
                self.resolve(request_id, PathOutcome::Failed(error))
            }
        }
    }

    fn resolve(&mut self, request_id: RequestId, outcome: PathOutcome) -> Option<NavEvent> {
        let Some(pending) = self.pending.remove(&request_id) else {
            debug!(client = %self.name, %request_id, "discarding reply for unknown request");
            return None;
        };
        debug!(
            client = %self.name,
            %request_id,
            elapsed_us = pending.sent_at.elapsed().as_micros() as u64,
            "request resolved"
        );
        Some(NavEvent::Path {
            request_id,
            outcome,
        })
    }
}
