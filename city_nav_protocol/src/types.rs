// Core wire types for the navigation worker protocol.
//
// `RequestId` tags every path query so replies can be matched to callers
// regardless of arrival order. `WirePoint` is the `{x, y, z}` shape used for
// positions in `FindPath` and `PathResult` envelopes. Neither type knows about
// the nav crate's own math types; the worker converts at the boundary.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Correlation token for one path query. Unique within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

impl RequestId {
    /// Allocate the next process-unique id. Ids start at 1 and never repeat
    /// for the lifetime of the process, even across multiple clients.
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// A world-space position as it appears on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WirePoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WirePoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}
