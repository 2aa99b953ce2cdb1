// Navigation worker: the state machine and the thread that runs it.
//
// `NavWorker` is the transport-independent core. It has two states:
// - `Uninitialized`: only `Init` does anything useful. `FindPath` gets a
//   `PathError("Worker not initialized")`.
// - `Ready`: owns a `NavEngine` built from its own decoded copy of the
//   navigation data. Each `FindPath` is answered independently and never
//   mutates the worker. A repeated `Init` re-acknowledges without rebuilding.
//
// A failed `Init` (bad bytes, bad config, validity check) replies
// `WorkerError` and leaves the worker `Uninitialized`; nothing from the
// failed attempt is kept. A panic inside one search is caught and reported as
// that request's `PathError`, and the worker keeps serving.
//
// `spawn_worker` runs a `NavWorker` on its own thread behind a pair of `mpsc`
// channels, processing messages strictly in arrival order. The thread exits
// when the caller drops its sender. `stdio.rs` runs the same core over a byte
// stream instead.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use city_nav::{NavConfig, NavEngine, NavPath, QueryError, Vec3};
use city_nav_protocol::{FromWorker, RequestId, ToWorker, WirePoint};
use tracing::{debug, error, info, warn};

use crate::error::ClientError;

/// Reply text for a query that arrives before a successful `Init`.
pub const NOT_INITIALIZED: &str = "Worker not initialized";

enum WorkerState {
    Uninitialized,
    Ready(Box<NavEngine>),
}

/// One navigation domain's worker core.
pub struct NavWorker {
    name: String,
    state: WorkerState,
}

impl NavWorker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: WorkerState::Uninitialized,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, WorkerState::Ready(_))
    }

    /// Process one message to completion and produce its reply.
    pub fn handle(&mut self, msg: ToWorker) -> FromWorker {
        match msg {
            ToWorker::Init {
                navigation_data,
                config_json,
            } => self.init(&navigation_data, &config_json),
            ToWorker::FindPath {
                request_id,
                start,
                end,
            } => self.find_path(request_id, start, end),
        }
    }

    fn init(&mut self, navigation_data: &[u8], config_json: &str) -> FromWorker {
        if let WorkerState::Ready(engine) = &self.state {
            debug!(worker = %self.name, backend = engine.backend_name(), "already ready, re-acknowledging init");
            return FromWorker::InitComplete;
        }

        let config = match NavConfig::from_json(config_json) {
            Ok(config) => config,
            Err(e) => return self.init_failed(format!("invalid build parameters: {e}")),
        };

        let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
            NavEngine::from_bytes(navigation_data, config)
        }));
        match loaded {
            Ok(Ok(engine)) => {
                info!(
                    worker = %self.name,
                    backend = engine.backend_name(),
                    data = %engine.summary(),
                    "navigation worker ready"
                );
                self.state = WorkerState::Ready(Box::new(engine));
                FromWorker::InitComplete
            }
            Ok(Err(e)) => self.init_failed(e.to_string()),
            Err(payload) => self.init_failed(format!(
                "engine panicked while loading: {}",
                panic_message(payload.as_ref())
            )),
        }
    }

    fn init_failed(&self, message: String) -> FromWorker {
        warn!(worker = %self.name, %message, "navigation worker init failed");
        FromWorker::WorkerError { message }
    }

    fn find_path(
        &self,
        request_id: RequestId,
        start: Option<WirePoint>,
        end: Option<WirePoint>,
    ) -> FromWorker {
        let WorkerState::Ready(engine) = &self.state else {
            debug!(worker = %self.name, %request_id, "query before init");
            return FromWorker::PathError {
                request_id,
                error: NOT_INITIALIZED.into(),
            };
        };
        let (Some(start), Some(end)) = (start, end) else {
            let missing = if start.is_none() { "start" } else { "end" };
            return FromWorker::PathError {
                request_id,
                error: QueryError::MissingEndpoint(missing).to_string(),
            };
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            engine.find_path(to_vec3(start), to_vec3(end))
        }));
        match outcome {
            Ok(Ok(Some(path))) => {
                debug!(worker = %self.name, %request_id, points = path.points.len(), length = path.length, "path found");
                path_result(request_id, &path)
            }
            Ok(Ok(None)) => {
                debug!(worker = %self.name, %request_id, "no path");
                FromWorker::no_path(request_id)
            }
            Ok(Err(e)) => FromWorker::PathError {
                request_id,
                error: e.to_string(),
            },
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(worker = %self.name, %request_id, %message, "path search panicked");
                FromWorker::PathError {
                    request_id,
                    error: QueryError::Internal(message).to_string(),
                }
            }
        }
    }
}

fn path_result(request_id: RequestId, path: &NavPath) -> FromWorker {
    FromWorker::PathResult {
        request_id,
        path: Some(path.points.iter().copied().map(to_wire).collect()),
        path_length: path.length,
    }
}

pub fn to_vec3(p: WirePoint) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

pub fn to_wire(p: Vec3) -> WirePoint {
    WirePoint::new(p.x, p.y, p.z)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Worker thread
// ---------------------------------------------------------------------------

/// Caller's end of a worker thread. Dropping it closes the inbound channel
/// and joins the thread (after it finishes the message it is processing).
pub struct WorkerHandle {
    sender: Option<Sender<ToWorker>>,
    inbox: Receiver<FromWorker>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn send(&self, msg: ToWorker) -> Result<(), ClientError> {
        self.sender
            .as_ref()
            .ok_or(ClientError::WorkerGone)?
            .send(msg)
            .map_err(|_| ClientError::WorkerGone)
    }

    /// Next reply if one is queued.
    pub fn try_recv(&self) -> Result<FromWorker, TryRecvError> {
        self.inbox.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<FromWorker, RecvTimeoutError> {
        self.inbox.recv_timeout(timeout)
    }

    /// Drain every queued reply without blocking.
    pub fn drain(&self) -> Vec<FromWorker> {
        let mut replies = Vec::new();
        while let Ok(reply) = self.inbox.try_recv() {
            replies.push(reply);
        }
        replies
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// A handle backed by bare channels with no thread, for driving a client
/// from tests. Returns the handle plus the worker's ends of both channels.
#[cfg(test)]
pub(crate) fn detached_handle() -> (WorkerHandle, Receiver<ToWorker>, Sender<FromWorker>) {
    let (to_worker, worker_rx) = mpsc::channel::<ToWorker>();
    let (worker_tx, from_worker) = mpsc::channel::<FromWorker>();
    let handle = WorkerHandle {
        sender: Some(to_worker),
        inbox: from_worker,
        thread: None,
    };
    (handle, worker_rx, worker_tx)
}

/// Start an uninitialized worker on a named background thread.
pub fn spawn_worker(name: &str) -> Result<WorkerHandle, ClientError> {
    let (to_worker, worker_rx) = mpsc::channel::<ToWorker>();
    let (worker_tx, from_worker) = mpsc::channel::<FromWorker>();
    let mut worker = NavWorker::new(name);

    let thread = thread::Builder::new()
        .name(format!("nav-worker-{name}"))
        .spawn(move || {
            while let Ok(msg) = worker_rx.recv() {
                let reply = worker.handle(msg);
                if worker_tx.send(reply).is_err() {
                    break; // Caller dropped its receiver.
                }
            }
            debug!(worker = %worker.name(), "navigation worker stopped");
        })?;

    Ok(WorkerHandle {
        sender: Some(to_worker),
        inbox: from_worker,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use city_nav::{
        GridTransform, NavigationData, WalkableMesh, build_polygon_zone, build_walkability_grid,
    };

    fn init_msg(data: &NavigationData) -> ToWorker {
        ToWorker::Init {
            navigation_data: data.to_bytes().unwrap(),
            config_json: String::new(),
        }
    }

    /// A 10 x 10 square made of two triangles.
    fn plaza() -> NavigationData {
        let mesh = WalkableMesh::indexed(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 10.0),
                Vec3::new(0.0, 0.0, 10.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        );
        build_polygon_zone(&mesh, 1e-4).unwrap()
    }

    fn find(id: u64, start: (f32, f32, f32), end: (f32, f32, f32)) -> ToWorker {
        ToWorker::FindPath {
            request_id: RequestId(id),
            start: Some(WirePoint::new(start.0, start.1, start.2)),
            end: Some(WirePoint::new(end.0, end.1, end.2)),
        }
    }

    #[test]
    fn find_before_init_is_a_path_error() {
        let mut worker = NavWorker::new("test");
        let reply = worker.handle(find(7, (0.0, 0.0, 0.0), (1.0, 0.0, 1.0)));
        assert_eq!(
            reply,
            FromWorker::PathError {
                request_id: RequestId(7),
                error: NOT_INITIALIZED.into()
            }
        );
        assert!(!worker.is_ready());
    }

    #[test]
    fn init_then_query() {
        let mut worker = NavWorker::new("test");
        assert_eq!(worker.handle(init_msg(&plaza())), FromWorker::InitComplete);
        assert!(worker.is_ready());
        match worker.handle(find(1, (1.0, 0.0, 2.0), (8.0, 0.0, 7.0))) {
            FromWorker::PathResult {
                request_id,
                path: Some(points),
                path_length,
            } => {
                assert_eq!(request_id, RequestId(1));
                assert!(points.len() >= 2);
                assert!(path_length > 0.0);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn second_init_reacknowledges_without_rebuilding() {
        let mut worker = NavWorker::new("test");
        assert_eq!(worker.handle(init_msg(&plaza())), FromWorker::InitComplete);
        // Garbage data is ignored because the worker is already ready.
        let again = ToWorker::Init {
            navigation_data: b"not navigation data".to_vec(),
            config_json: String::new(),
        };
        assert_eq!(worker.handle(again), FromWorker::InitComplete);
        assert!(matches!(
            worker.handle(find(2, (1.0, 0.0, 1.0), (9.0, 0.0, 9.0))),
            FromWorker::PathResult { path: Some(_), .. }
        ));
    }

    #[test]
    fn bad_data_leaves_worker_uninitialized() {
        let mut worker = NavWorker::new("test");
        let reply = worker.handle(ToWorker::Init {
            navigation_data: b"{\"Grid\":{\"width\":0}}".to_vec(),
            config_json: String::new(),
        });
        assert!(matches!(reply, FromWorker::WorkerError { .. }));
        assert!(!worker.is_ready());

        // A later valid init still succeeds.
        assert_eq!(worker.handle(init_msg(&plaza())), FromWorker::InitComplete);
    }

    #[test]
    fn bad_config_is_a_worker_error() {
        let mut worker = NavWorker::new("test");
        let reply = worker.handle(ToWorker::Init {
            navigation_data: plaza().to_bytes().unwrap(),
            config_json: "{\"grid_snap_radius\": \"far\"}".into(),
        });
        assert!(matches!(reply, FromWorker::WorkerError { .. }));
        assert!(!worker.is_ready());
    }

    #[test]
    fn missing_endpoint_is_a_path_error() {
        let mut worker = NavWorker::new("test");
        worker.handle(init_msg(&plaza()));
        let reply = worker.handle(ToWorker::FindPath {
            request_id: RequestId(3),
            start: Some(WirePoint::new(1.0, 0.0, 1.0)),
            end: None,
        });
        match reply {
            FromWorker::PathError { request_id, error } => {
                assert_eq!(request_id, RequestId(3));
                assert!(error.contains("end"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn non_finite_endpoint_is_a_path_error() {
        let mut worker = NavWorker::new("test");
        worker.handle(init_msg(&plaza()));
        let reply = worker.handle(find(4, (f32::INFINITY, 0.0, 0.0), (1.0, 0.0, 1.0)));
        assert!(matches!(reply, FromWorker::PathError { .. }));
        // The worker is still healthy afterwards.
        assert!(matches!(
            worker.handle(find(5, (1.0, 0.0, 1.0), (2.0, 0.0, 2.0))),
            FromWorker::PathResult { .. }
        ));
    }

    #[test]
    fn blocked_grid_reports_no_path() {
        let matrix = vec![vec![true, false, true]; 3];
        let data = build_walkability_grid(3, 3, &matrix, GridTransform::default()).unwrap();
        let mut worker = NavWorker::new("grid");
        assert_eq!(worker.handle(init_msg(&data)), FromWorker::InitComplete);
        let reply = worker.handle(find(6, (0.5, 0.0, 1.5), (2.5, 0.0, 1.5)));
        assert_eq!(reply, FromWorker::no_path(RequestId(6)));
    }

    #[test]
    fn spawned_worker_answers_in_order() {
        let handle = spawn_worker("threaded").unwrap();
        handle.send(find(10, (0.0, 0.0, 0.0), (1.0, 0.0, 1.0))).unwrap();
        handle.send(init_msg(&plaza())).unwrap();
        handle.send(find(11, (1.0, 0.0, 1.0), (9.0, 0.0, 9.0))).unwrap();

        let timeout = Duration::from_secs(5);
        let first = handle.recv_timeout(timeout).unwrap();
        assert!(matches!(first, FromWorker::PathError { .. }));
        assert_eq!(handle.recv_timeout(timeout).unwrap(), FromWorker::InitComplete);
        let third = handle.recv_timeout(timeout).unwrap();
        assert_eq!(third.request_id(), Some(RequestId(11)));
    }
}
