// Test-only harness for end-to-end navigation tests.
//
// Wraps the real `NavClient` (from `city_nav_worker`) in a synchronous,
// test-friendly API, and provides fixture geometry:
// - procedural city block layouts (a lattice of solid blocks separated by
//   streets) as a walkability matrix, a grid `NavigationData`, or a street
//   triangle mesh for the polygon builder;
// - small hand-made meshes for the disjoint-component scenarios.
//
// The only test-specific code is the blocking poll loops; everything else
// goes through the same worker thread, channels and correlator the
// simulation uses.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use city_nav::{
    GridTransform, NavConfig, NavigationData, Vec3, WalkableMesh, build_polygon_zone,
    build_walkability_grid,
};
use city_nav_protocol::RequestId;
use city_nav_worker::{NavClient, NavEvent, PathOutcome};

/// Default timeout for blocking poll operations.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Install a tracing subscriber that writes through the test harness.
pub fn trace_init() {
    use tracing_subscriber::filter::LevelFilter;
    let collector = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .with_test_writer()
        .without_time()
        .finish();
    let _ = tracing::subscriber::set_global_default(collector);
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Walkability matrix for `blocks` x `blocks` solid city blocks of `block`
/// cells, with `street`-wide streets between them and around the edge.
/// `matrix[y][x]`, square, side `blocks * (block + street) + street`.
pub fn city_block_matrix(blocks: u32, block: u32, street: u32) -> Vec<Vec<bool>> {
    let period = block + street;
    let side = blocks * period + street;
    (0..side)
        .map(|y| (0..side).map(|x| x % period < street || y % period < street).collect())
        .collect()
}

/// Grid navigation data for a matrix, with the default unit transform.
pub fn grid_data(matrix: &[Vec<bool>]) -> NavigationData {
    let height = matrix.len() as u32;
    let width = matrix.first().map_or(0, |row| row.len()) as u32;
    build_walkability_grid(width, height, matrix, GridTransform::default())
        .expect("fixture grid is valid")
}

/// A walkable triangle mesh covering the walkable cells of `matrix`, each
/// cell a quad of side `cell_size` at height `y`. Every cell has its own four
/// corner vertices; the builder's welding is what stitches them together.
pub fn mesh_from_matrix(matrix: &[Vec<bool>], cell_size: f32, y: f32) -> WalkableMesh {
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    for (gz, row) in matrix.iter().enumerate() {
        for (gx, &walkable) in row.iter().enumerate() {
            if !walkable {
                continue;
            }
            let x0 = gx as f32 * cell_size;
            let z0 = gz as f32 * cell_size;
            let base = positions.len() as u32;
            positions.extend([
                Vec3::new(x0, y, z0),
                Vec3::new(x0 + cell_size, y, z0),
                Vec3::new(x0 + cell_size, y, z0 + cell_size),
                Vec3::new(x0, y, z0 + cell_size),
            ]);
            indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }
    WalkableMesh::indexed(positions, indices)
}

/// Polygon navigation data for a city block street network.
pub fn city_street_zone(blocks: u32, block: u32, street: u32, cell_size: f32) -> NavigationData {
    let mesh = mesh_from_matrix(&city_block_matrix(blocks, block, street), cell_size, 0.0);
    build_polygon_zone(&mesh, NavConfig::default().weld_tolerance).expect("fixture mesh builds")
}

/// Two triangles far apart that share no edge.
pub fn two_islands_mesh() -> WalkableMesh {
    WalkableMesh::indexed(
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 4.0),
            Vec3::new(20.0, 0.0, 20.0),
            Vec3::new(24.0, 0.0, 20.0),
            Vec3::new(20.0, 0.0, 24.0),
        ],
        vec![0, 1, 2, 3, 4, 5],
    )
}

// ---------------------------------------------------------------------------
// Blocking client wrapper
// ---------------------------------------------------------------------------

/// A test navigation client wrapping a real `NavClient`.
pub struct TestNavClient {
    pub client: NavClient,
    resolved: HashMap<RequestId, PathOutcome>,
}

impl TestNavClient {
    /// Spawn a worker for `data` and block until it is ready.
    pub fn start(name: &str, data: &NavigationData, config: &NavConfig) -> Self {
        let client = NavClient::spawn(name, data, config).expect("NavClient::spawn failed");
        let mut this = Self {
            client,
            resolved: HashMap::new(),
        };
        this.poll_until_ready();
        this
    }

    /// Blocking poll until the worker reports `Ready`. Panics on init failure.
    pub fn poll_until_ready(&mut self) {
        let start = Instant::now();
        loop {
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for Ready");
            for event in self.client.poll() {
                match event {
                    NavEvent::Ready => return,
                    NavEvent::InitFailed { message } => panic!("worker init failed: {message}"),
                    NavEvent::Path {
                        request_id,
                        outcome,
                    } => self.record(request_id, outcome),
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn request(&mut self, start: Vec3, end: Vec3) -> RequestId {
        self.client
            .request_path(start, end)
            .expect("request_path failed")
    }

    /// Blocking poll until every id in `ids` has resolved. Panics if any id
    /// resolves twice.
    pub fn poll_until_resolved(&mut self, ids: &[RequestId]) -> HashMap<RequestId, PathOutcome> {
        let start = Instant::now();
        while !ids.iter().all(|id| self.resolved.contains_key(id)) {
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for {} requests",
                ids.len()
            );
            for event in self.client.poll() {
                if let NavEvent::Path {
                    request_id,
                    outcome,
                } = event
                {
                    self.record(request_id, outcome);
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
        ids.iter()
            .filter_map(|id| self.resolved.remove_entry(id))
            .collect()
    }

    /// Request one path and block until it resolves.
    pub fn find_path(&mut self, start: Vec3, end: Vec3) -> PathOutcome {
        let id = self.request(start, end);
        self.poll_until_resolved(&[id])
            .remove(&id)
            .expect("resolved outcome present")
    }

    /// Outcomes that have arrived but not been collected.
    pub fn uncollected(&self) -> usize {
        self.resolved.len()
    }

    fn record(&mut self, request_id: RequestId, outcome: PathOutcome) {
        let previous = self.resolved.insert(request_id, outcome);
        assert!(previous.is_none(), "{request_id} resolved twice");
    }
}

/// Blocking poll on a raw client until init fails. Returns the message.
pub fn poll_until_init_failed(client: &mut NavClient) -> String {
    let start = Instant::now();
    loop {
        assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for InitFailed");
        for event in client.poll() {
            match event {
                NavEvent::InitFailed { message } => return message,
                NavEvent::Ready => panic!("worker unexpectedly became ready"),
                NavEvent::Path { .. } => {}
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}
