// city_nav_protocol: message protocol for navigation workers.
//
// Defines the typed envelopes exchanged between a caller (the simulation
// loop's query correlator) and a navigation worker, plus framing for running
// a worker over a byte stream. Shared by both sides; no dependency on the nav
// crate.
//
// Module overview:
// - `types.rs`:    `RequestId` (process-unique correlation token) and
//                  `WirePoint` (`{x, y, z}` positions).
// - `message.rs`:  `ToWorker` (Init, FindPath) and `FromWorker`
//                  (InitComplete, WorkerError, PathResult, PathError).
// - `framing.rs`:  4-byte big-endian length prefix + JSON payload over any
//                  `Read`/`Write`.
//
// Design decisions:
// - **JSON serialization.** Matches the nav crate's serde_json usage for
//   navigation data, so one format crosses every boundary.
// - **Navigation data as opaque `Vec<u8>`.** The protocol never inspects it.
// - **No async runtime.** Workers are plain threads fed by channels or
//   blocking streams.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{FrameError, MAX_FRAME_SIZE, read_frame, recv, send, write_frame};
pub use message::{FromWorker, ToWorker};
pub use types::{RequestId, WirePoint};
