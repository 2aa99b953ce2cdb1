// Walkability grid runtime and grid A*.
//
// `WalkGrid` is the loaded, immutable form of `GridData`. Search runs on a
// per-query scratch copy of the mutable search state (`g_score`, `parent`,
// `closed`), never on the shared walkability matrix, so overlapping queries
// cannot disturb each other.
//
// Search rules:
// - 8-directional movement (4 when diagonals are disabled).
// - No corner cutting: a diagonal step is allowed only if both orthogonal
//   cells it passes between are walkable.
// - Step cost 1 orthogonal, sqrt(2) diagonal; every walkable cell costs the
//   same to enter.
// - Manhattan heuristic.
//
// Endpoint snapping: a cell that is out of bounds is clamped into the grid;
// a blocked cell is replaced by the nearest walkable cell within a Chebyshev
// ring radius (ties broken by scan order), or rejected.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::LoadError;
use crate::navdata::{GridData, GridTransform};
use crate::types::{GridCell, Vec3};

const NO_PARENT: u32 = u32::MAX;

/// Orthogonal offsets, then diagonals. Diagonal `(dx, dy)` is flanked by
/// cells `(dx, 0)` and `(0, dy)`.
const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const DIAGONAL: [(i32, i32); 4] = [(1, -1), (1, 1), (-1, 1), (-1, -1)];

/// A loaded walkability grid.
#[derive(Clone, Debug)]
pub struct WalkGrid {
    width: u32,
    height: u32,
    walkable: Vec<bool>,
    transform: GridTransform,
}

impl WalkGrid {
    pub fn load(data: GridData) -> Result<Self, LoadError> {
        if data.width == 0 || data.height == 0 {
            return Err(LoadError::Malformed(format!(
                "grid dimensions {}x{} must be positive",
                data.width, data.height
            )));
        }
        let expected = data.width as usize * data.height as usize;
        if data.walkable.len() != expected {
            return Err(LoadError::Malformed(format!(
                "grid {}x{} needs {expected} cells, got {}",
                data.width,
                data.height,
                data.walkable.len()
            )));
        }
        if !data.transform.is_valid() {
            return Err(LoadError::Malformed("grid transform is invalid".into()));
        }
        Ok(Self {
            width: data.width,
            height: data.height,
            walkable: data.walkable,
            transform: data.transform,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    pub fn walkable_count(&self) -> usize {
        self.walkable.iter().filter(|&&w| w).count()
    }

    pub fn in_bounds(&self, cell: GridCell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    pub fn is_walkable(&self, cell: GridCell) -> bool {
        self.in_bounds(cell) && self.walkable[self.index(cell)]
    }

    pub fn world_to_cell(&self, pos: Vec3) -> GridCell {
        self.transform.world_to_cell(pos)
    }

    pub fn cell_to_world(&self, cell: GridCell) -> Vec3 {
        self.transform.cell_to_world(cell)
    }

    fn index(&self, cell: GridCell) -> usize {
        cell.y as usize * self.width as usize + cell.x as usize
    }

    fn cell_at(&self, index: usize) -> GridCell {
        let w = self.width as usize;
        GridCell::new((index % w) as i32, (index / w) as i32)
    }

    /// Move `cell` onto the grid and onto a walkable cell. Out-of-bounds
    /// cells are clamped first; a blocked cell searches rings of growing
    /// Chebyshev radius up to `radius` and takes the closest walkable cell.
    /// A `radius` of 0 disables snapping: only a walkable in-bounds cell is
    /// accepted.
    pub fn snap_cell(&self, cell: GridCell, radius: u32) -> Option<GridCell> {
        if radius == 0 {
            return self.is_walkable(cell).then_some(cell);
        }
        let clamped = GridCell::new(
            cell.x.clamp(0, self.width as i32 - 1),
            cell.y.clamp(0, self.height as i32 - 1),
        );
        if self.is_walkable(clamped) {
            return Some(clamped);
        }
        for r in 1..=radius as i32 {
            let mut best: Option<(GridCell, i32)> = None;
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx.abs() != r && dy.abs() != r {
                        continue;
                    }
                    let c = GridCell::new(clamped.x + dx, clamped.y + dy);
                    let d = dx * dx + dy * dy;
                    if self.is_walkable(c) && best.is_none_or(|(_, bd)| d < bd) {
                        best = Some((c, d));
                    }
                }
            }
            if let Some((c, _)) = best {
                return Some(c);
            }
        }
        None
    }

    /// A* from `start` to `goal`. Both must be walkable. Returns the cell
    /// sequence from start to goal inclusive, or `None` if unreachable.
    pub fn find_path(&self, start: GridCell, goal: GridCell, allow_diagonal: bool) -> Option<Vec<GridCell>> {
        if !self.is_walkable(start) || !self.is_walkable(goal) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        let n = self.walkable.len();
        let mut g_score = vec![f32::INFINITY; n];
        let mut parent = vec![NO_PARENT; n];
        let mut closed = vec![false; n];

        let si = self.index(start);
        let gi = self.index(goal);
        g_score[si] = 0.0;

        let mut open = BinaryHeap::new();
        open.push(OpenEntry {
            index: si as u32,
            f_score: manhattan(start, goal),
        });

        while let Some(current) = open.pop() {
            let ci = current.index as usize;
            if ci == gi {
                return Some(self.reconstruct(&parent, si, gi));
            }
            if closed[ci] {
                continue;
            }
            closed[ci] = true;

            let cell = self.cell_at(ci);
            let current_g = g_score[ci];
            let mut relax = |next: GridCell, step: f32| {
                let ni = self.index(next);
                if closed[ni] {
                    return;
                }
                let tentative_g = current_g + step;
                if tentative_g < g_score[ni] {
                    g_score[ni] = tentative_g;
                    parent[ni] = ci as u32;
                    open.push(OpenEntry {
                        index: ni as u32,
                        f_score: tentative_g + manhattan(next, goal),
                    });
                }
            };

            for (dx, dy) in ORTHOGONAL {
                let next = GridCell::new(cell.x + dx, cell.y + dy);
                if self.is_walkable(next) {
                    relax(next, 1.0);
                }
            }
            if allow_diagonal {
                for (dx, dy) in DIAGONAL {
                    let next = GridCell::new(cell.x + dx, cell.y + dy);
                    let flank_a = GridCell::new(cell.x + dx, cell.y);
                    let flank_b = GridCell::new(cell.x, cell.y + dy);
                    if self.is_walkable(next) && self.is_walkable(flank_a) && self.is_walkable(flank_b) {
                        relax(next, std::f32::consts::SQRT_2);
                    }
                }
            }
        }
        None
    }

    fn reconstruct(&self, parent: &[u32], start: usize, goal: usize) -> Vec<GridCell> {
        let mut cells = vec![self.cell_at(goal)];
        let mut at = goal;
        while at != start {
            at = parent[at] as usize;
            cells.push(self.cell_at(at));
        }
        cells.reverse();
        cells
    }
}

fn manhattan(a: GridCell, b: GridCell) -> f32 {
    ((a.x - b.x).abs() + (a.y - b.y).abs()) as f32
}

/// Entry in the A* open set (min-heap via reversed ordering).
struct OpenEntry {
    index: u32,
    f_score: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal && self.index == other.index
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.index.cmp(&self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse rows of `.` (walkable) and `#` (blocked).
    fn grid(rows: &[&str]) -> WalkGrid {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let walkable = rows.iter().flat_map(|r| r.chars().map(|c| c == '.')).collect();
        WalkGrid::load(GridData {
            width,
            height,
            walkable,
            transform: GridTransform::default(),
        })
        .unwrap()
    }

    fn steps_are_legal(g: &WalkGrid, path: &[GridCell]) {
        for w in path.windows(2) {
            let (a, b) = (w[0], w[1]);
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            assert!(dx.abs() <= 1 && dy.abs() <= 1 && (dx, dy) != (0, 0));
            assert!(g.is_walkable(b));
            if dx != 0 && dy != 0 {
                assert!(g.is_walkable(GridCell::new(a.x + dx, a.y)));
                assert!(g.is_walkable(GridCell::new(a.x, a.y + dy)));
            }
        }
    }

    #[test]
    fn open_grid_goes_diagonal() {
        let g = grid(&["...", "...", "..."]);
        let path = g.find_path(GridCell::new(0, 0), GridCell::new(2, 2), true).unwrap();
        assert_eq!(
            path,
            vec![GridCell::new(0, 0), GridCell::new(1, 1), GridCell::new(2, 2)]
        );
    }

    #[test]
    fn blocked_center_routes_around_without_cutting_corners() {
        let g = grid(&["...", ".#.", "..."]);
        let path = g.find_path(GridCell::new(0, 0), GridCell::new(2, 2), true).unwrap();
        assert!(!path.contains(&GridCell::new(1, 1)));
        steps_are_legal(&g, &path);
        // Every diagonal is flanked by the center, so the route is 4 orthogonal steps.
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn diagonal_rejected_when_one_flank_blocked() {
        // (0,0) -> (1,1) has open target but blocked flank (1,0).
        let g = grid(&[".#", ".."]);
        let path = g.find_path(GridCell::new(0, 0), GridCell::new(1, 1), true).unwrap();
        assert_eq!(
            path,
            vec![GridCell::new(0, 0), GridCell::new(0, 1), GridCell::new(1, 1)]
        );
    }

    #[test]
    fn four_way_mode_never_steps_diagonally() {
        let g = grid(&["...", "...", "..."]);
        let path = g.find_path(GridCell::new(0, 0), GridCell::new(2, 2), false).unwrap();
        assert_eq!(path.len(), 5);
        for w in path.windows(2) {
            assert_eq!((w[1].x - w[0].x).abs() + (w[1].y - w[0].y).abs(), 1);
        }
    }

    #[test]
    fn wall_makes_goal_unreachable() {
        let g = grid(&["..#..", "..#..", "..#.."]);
        assert!(g.find_path(GridCell::new(0, 1), GridCell::new(4, 1), true).is_none());
    }

    #[test]
    fn blocked_endpoints_are_rejected_by_search() {
        let g = grid(&["#..", "...", "..."]);
        assert!(g.find_path(GridCell::new(0, 0), GridCell::new(2, 2), true).is_none());
    }

    #[test]
    fn snapping_clamps_and_finds_nearest_open_cell() {
        let g = grid(&["###..", "###..", "###.."]);
        assert_eq!(g.snap_cell(GridCell::new(10, 1), 1), Some(GridCell::new(4, 1)));
        assert_eq!(g.snap_cell(GridCell::new(2, 1), 1), Some(GridCell::new(3, 1)));
        assert_eq!(g.snap_cell(GridCell::new(0, 1), 2), None);
        assert_eq!(g.snap_cell(GridCell::new(0, 1), 3), Some(GridCell::new(3, 1)));
    }

    #[test]
    fn zero_radius_disables_snapping() {
        let g = grid(&["###..", "###..", "###.."]);
        assert_eq!(g.snap_cell(GridCell::new(3, 1), 0), Some(GridCell::new(3, 1)));
        assert_eq!(g.snap_cell(GridCell::new(10, 1), 0), None);
        assert_eq!(g.snap_cell(GridCell::new(-1, 1), 0), None);
        assert_eq!(g.snap_cell(GridCell::new(2, 1), 0), None);
    }

    #[test]
    fn search_is_repeatable() {
        let g = grid(&[".....", ".###.", ".....", ".#.#.", "....."]);
        let a = g.find_path(GridCell::new(0, 0), GridCell::new(4, 4), true);
        let b = g.find_path(GridCell::new(0, 0), GridCell::new(4, 4), true);
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn load_rejects_wrong_cell_count() {
        let data = GridData {
            width: 3,
            height: 3,
            walkable: vec![true; 8],
            transform: GridTransform::default(),
        };
        assert!(matches!(WalkGrid::load(data), Err(LoadError::Malformed(_))));
    }
}
