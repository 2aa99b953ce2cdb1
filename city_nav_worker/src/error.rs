// Caller-side errors for talking to a navigation worker.
//
// These are infrastructure faults on the caller's side of the channel. What
// the worker reports about a query (no path, path error) arrives as data in
// a `NavEvent`, never as a `ClientError`.

use std::io;
use std::time::Duration;

use city_nav_protocol::RequestId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("navigation worker thread has exited")]
    WorkerGone,
    #[error("navigation worker failed to initialize: {0}")]
    NotReady(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0} is not pending on this client")]
    UnknownRequest(RequestId),
    #[error("navigation data could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("navigation worker thread could not be spawned: {0}")]
    Spawn(#[from] io::Error),
}
