// city_nav_worker: runs city_nav off the simulation loop.
//
// The simulation never searches on its own thread. It builds navigation data
// with `city_nav`, hands a serialized copy to a worker, and then exchanges
// messages: `NavClient::request_path` posts a query and `NavClient::poll`
// collects whatever replies have arrived, correlated by request id.
//
// Module overview:
// - `worker.rs`: NavWorker state machine (Uninitialized -> Ready) and the
//                worker thread (`spawn_worker`) behind `mpsc` channels.
// - `client.rs`: NavClient, the query correlator: pending-request table,
//                non-blocking poll, cancellation, optional blocking waits.
// - `stdio.rs`:  Serves a worker over a framed byte stream (used by the
//                `city-nav-worker` binary).
// - `error.rs`:  ClientError.
//
// Dependencies: `city_nav` (engines) and `city_nav_protocol` (messages and
// framing). No shared mutable state crosses a thread: navigation data is
// copied at init, and every query and reply is a message.

pub mod client;
pub mod error;
pub mod stdio;
pub mod worker;

pub use client::{NavClient, NavEvent, PathOutcome, WorkerStatus};
pub use error::ClientError;
pub use worker::{NavWorker, WorkerHandle, spawn_worker};
