// Protocol messages between a navigation caller and a navigation worker.
//
// Two enums define the full protocol vocabulary:
// - `ToWorker`: sent by the caller (the query correlator) to a worker.
// - `FromWorker`: sent by a worker back to its caller.
//
// Navigation data travels as an opaque byte payload (`Vec<u8>`) holding the
// nav crate's serialized `NavigationData`; build parameters travel as a JSON
// object string. This keeps the protocol crate independent of the nav crate,
// the same way command payloads stay opaque to a relay.
//
// `FindPath` endpoints are `Option`s so that a malformed request (missing
// `start` or `end`) still deserializes and can be answered with a per-request
// `PathError` instead of poisoning the channel.

use serde::{Deserialize, Serialize};

use crate::types::{RequestId, WirePoint};

/// Messages sent by a caller to a navigation worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ToWorker {
    /// Load navigation data. Answered by `InitComplete` or `WorkerError`.
    Init {
        navigation_data: Vec<u8>,
        config_json: String,
    },
    /// Path query. Answered by `PathResult` or `PathError` with the same id.
    FindPath {
        request_id: RequestId,
        start: Option<WirePoint>,
        end: Option<WirePoint>,
    },
}

/// Messages sent by a navigation worker to its caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FromWorker {
    /// Navigation data loaded and validated; the worker is ready.
    InitComplete,
    /// The worker could not load its data and stays uninitialized.
    WorkerError { message: String },
    /// Query finished. `path: None` means no path exists (not an error).
    PathResult {
        request_id: RequestId,
        path: Option<Vec<WirePoint>>,
        path_length: f32,
    },
    /// Query failed; the worker itself is still healthy.
    PathError { request_id: RequestId, error: String },
}

impl FromWorker {
    /// The request this reply answers, if it is a per-query reply.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            FromWorker::PathResult { request_id, .. } | FromWorker::PathError { request_id, .. } => {
                Some(*request_id)
            }
            FromWorker::InitComplete | FromWorker::WorkerError { .. } => None,
        }
    }

    /// Convenience constructor for the "no path" outcome.
    pub fn no_path(request_id: RequestId) -> Self {
        FromWorker::PathResult {
            request_id,
            path: None,
            path_length: 0.0,
        }
    }
}
