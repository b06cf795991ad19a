// Maze model: a grid of cells with per-side wall, stop-strip, and
// load-zone state, plus the geometry queries the vehicle needs.
//
// Provides:
// - Edge-mirrored mutators (both cells sharing an edge always agree)
// - Ray casting against walls for the ultrasonic sensor
// - Segment/wall crossing tests for bump sensors and collision detection
// - Floor-marking region queries for the color sensor

pub mod geometry;
pub mod layout;

pub use geometry::{Point, RayHit, Segment};
pub use layout::{LayoutError, load_layout, parse_layout};

use crate::config::{STOP_STRIP_WIDTH, ZONE_DEPTH};

/// One side of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    North,
    South,
    East,
    West,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::South, Side::East, Side::West];

    pub fn opposite(self) -> Side {
        match self {
            Side::North => Side::South,
            Side::South => Side::North,
            Side::East => Side::West,
            Side::West => Side::East,
        }
    }

    fn index(self) -> usize {
        match self {
            Side::North => 0,
            Side::South => 1,
            Side::East => 2,
            Side::West => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WallState {
    #[default]
    Unknown,
    Present,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopState {
    #[default]
    Unknown,
    Normal,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoneState {
    #[default]
    Unknown,
    Normal,
    Pickup,
    Dropoff,
}

/// Per-cell side state, indexed North/South/East/West
#[derive(Debug, Clone, Default)]
pub struct Cell {
    walls: [WallState; 4],
    stops: [StopState; 4],
    zones: [ZoneState; 4],
}

/// The maze grid. Cells are addressed by 1-based `(col, row)` with row 1
/// at the north edge; the backing store is a flat `width * height` vector.
///
/// World frame: x grows east from the west edge, y grows north from the
/// south edge, so cell `(1, height)` touches the world origin.
#[derive(Debug, Clone)]
pub struct Maze {
    width: usize,
    height: usize,
    cell_size: f64,
    cells: Vec<Cell>,
}

impl Maze {
    pub fn new(width: usize, height: usize, cell_size: f64) -> Self {
        Self {
            width,
            height,
            cell_size,
            cells: vec![Cell::default(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    fn idx(&self, col: usize, row: usize) -> Option<usize> {
        if col >= 1 && col <= self.width && row >= 1 && row <= self.height {
            Some((row - 1) * self.width + (col - 1))
        } else {
            None
        }
    }

    /// The cell across `side` of `(col, row)`, if it exists. Row numbers
    /// grow southward, so the North neighbor of `(c, r)` is `(c, r-1)`.
    fn neighbor(&self, col: usize, row: usize, side: Side) -> Option<(usize, usize)> {
        let (col, row) = (col as isize, row as isize);
        let (nc, nr) = match side {
            Side::North => (col, row - 1),
            Side::South => (col, row + 1),
            Side::East => (col + 1, row),
            Side::West => (col - 1, row),
        };
        if nc >= 1 && nc <= self.width as isize && nr >= 1 && nr <= self.height as isize {
            Some((nc as usize, nr as usize))
        } else {
            None
        }
    }

    pub fn wall(&self, col: usize, row: usize, side: Side) -> WallState {
        self.idx(col, row)
            .map(|i| self.cells[i].walls[side.index()])
            .unwrap_or_default()
    }

    pub fn stop(&self, col: usize, row: usize, side: Side) -> StopState {
        self.idx(col, row)
            .map(|i| self.cells[i].stops[side.index()])
            .unwrap_or_default()
    }

    pub fn zone(&self, col: usize, row: usize, side: Side) -> ZoneState {
        self.idx(col, row)
            .map(|i| self.cells[i].zones[side.index()])
            .unwrap_or_default()
    }

    fn apply_side(&mut self, col: usize, row: usize, side: Side, f: impl Fn(&mut Cell, usize)) {
        if let Some(i) = self.idx(col, row) {
            f(&mut self.cells[i], side.index());
        }
        if let Some((nc, nr)) = self.neighbor(col, row, side) {
            if let Some(j) = self.idx(nc, nr) {
                f(&mut self.cells[j], side.opposite().index());
            }
        }
    }

    /// Set a wall. The mirrored side of the adjacent cell is updated to
    /// match, and a Present wall clears any stop strip or load zone on
    /// that edge (a wall cannot coexist with floor markings).
    pub fn set_wall(&mut self, col: usize, row: usize, side: Side, state: WallState) {
        self.apply_side(col, row, side, |cell, s| {
            cell.walls[s] = state;
            if state == WallState::Present {
                cell.stops[s] = StopState::Normal;
                cell.zones[s] = ZoneState::Normal;
            }
        });
    }

    /// Set a stop strip, mirrored across the edge. Painting a strip forces
    /// the edge's wall to Absent.
    pub fn set_stop(&mut self, col: usize, row: usize, side: Side, state: StopState) {
        self.apply_side(col, row, side, |cell, s| {
            cell.stops[s] = state;
            if state == StopState::Stop {
                cell.walls[s] = WallState::Absent;
            }
        });
    }

    /// Set a load zone, mirrored across the edge. Marking a pickup or
    /// dropoff zone forces the edge's wall to Absent.
    pub fn set_zone(&mut self, col: usize, row: usize, side: Side, state: ZoneState) {
        self.apply_side(col, row, side, |cell, s| {
            cell.zones[s] = state;
            if state == ZoneState::Pickup || state == ZoneState::Dropoff {
                cell.walls[s] = WallState::Absent;
            }
        });
    }

    /// World-frame extents: `(width * cell_size, height * cell_size)`
    pub fn bounds(&self) -> (f64, f64) {
        (
            self.width as f64 * self.cell_size,
            self.height as f64 * self.cell_size,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        let (w, h) = self.bounds();
        p.x >= 0.0 && p.x <= w && p.y >= 0.0 && p.y <= h
    }

    /// The `(col, row)` of the cell containing `p`, or None outside the
    /// maze. Points exactly on a boundary belong to the east/north cell,
    /// except along the outer edge where they are clamped inward.
    pub fn cell_at(&self, p: Point) -> Option<(usize, usize)> {
        if !self.contains(p) {
            return None;
        }
        let col = ((p.x / self.cell_size).floor() as usize + 1).min(self.width);
        let rows_from_south = (p.y / self.cell_size).floor() as usize;
        let row = self.height.saturating_sub(rows_from_south).max(1);
        Some((col, row))
    }

    /// World-frame center of a cell
    pub fn cell_center(&self, col: usize, row: usize) -> Point {
        let s = self.cell_size;
        Point::new(
            (col as f64 - 0.5) * s,
            (self.height as f64 - row as f64 + 0.5) * s,
        )
    }

    /// World-frame segment of one side of a cell
    fn side_segment(&self, col: usize, row: usize, side: Side) -> Segment {
        let s = self.cell_size;
        let x0 = (col - 1) as f64 * s;
        let x1 = col as f64 * s;
        let y0 = (self.height - row) as f64 * s;
        let y1 = (self.height - row + 1) as f64 * s;
        match side {
            Side::North => Segment::new(Point::new(x0, y1), Point::new(x1, y1)),
            Side::South => Segment::new(Point::new(x0, y0), Point::new(x1, y0)),
            Side::East => Segment::new(Point::new(x1, y0), Point::new(x1, y1)),
            Side::West => Segment::new(Point::new(x0, y0), Point::new(x0, y1)),
        }
    }

    /// Distance along the side's inward normal from `p` to the side's
    /// wall line. `p` is assumed to lie inside the cell.
    fn distance_to_side(&self, p: Point, col: usize, row: usize, side: Side) -> f64 {
        let seg = self.side_segment(col, row, side);
        match side {
            Side::North | Side::South => (p.y - seg.a.y).abs(),
            Side::East | Side::West => (p.x - seg.a.x).abs(),
        }
    }

    /// Cast a ray and return the nearest Present wall it hits. Brute force
    /// over every wall segment in the grid; the maze is small and this
    /// runs a handful of times per tick.
    pub fn closest_wall(&self, origin: Point, dir_deg: f64) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        for row in 1..=self.height {
            for col in 1..=self.width {
                for side in Side::ALL {
                    if self.wall(col, row, side) != WallState::Present {
                        continue;
                    }
                    let seg = self.side_segment(col, row, side);
                    if let Some(hit) = geometry::ray_hit(origin, dir_deg, seg) {
                        if best.map(|b| hit.distance < b.distance).unwrap_or(true) {
                            best = Some(hit);
                        }
                    }
                }
            }
        }
        best
    }

    /// Whether the segment `a`..`b` crosses a Present wall (or leaves the
    /// maze). Endpoints in the same cell cannot cross a wall; endpoints in
    /// adjacent cells are resolved against the walls on the boundaries the
    /// segment actually crosses.
    pub fn segment_crosses_wall(&self, a: Point, b: Point) -> bool {
        if !self.contains(a) || !self.contains(b) {
            return true;
        }
        // Unwraps are fine: both points are in bounds
        let ca = self.cell_at(a).unwrap();
        let cb = self.cell_at(b).unwrap();
        if ca == cb {
            return false;
        }

        let dc = cb.0 as isize - ca.0 as isize;
        let dr = cb.1 as isize - ca.1 as isize;
        if dc.abs() > 1 || dr.abs() > 1 {
            // Long segment spanning non-adjacent cells: bisect until each
            // half stays within neighboring cells
            let mid = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
            return self.segment_crosses_wall(a, mid) || self.segment_crosses_wall(mid, b);
        }

        match (dc, dr) {
            (dc, 0) => {
                let side = if dc > 0 { Side::East } else { Side::West };
                self.wall(ca.0, ca.1, side) == WallState::Present
            }
            (0, dr) => {
                let side = if dr > 0 { Side::South } else { Side::North };
                self.wall(ca.0, ca.1, side) == WallState::Present
            }
            _ => self.diagonal_crosses_wall(a, b, ca, cb),
        }
    }

    /// Diagonal neighbor case: interpolate where the segment crosses the
    /// shared vertical and horizontal boundary lines and check the wall on
    /// each crossed edge.
    fn diagonal_crosses_wall(
        &self,
        a: Point,
        b: Point,
        ca: (usize, usize),
        cb: (usize, usize),
    ) -> bool {
        let s = self.cell_size;

        // Vertical boundary between the two columns
        let west_col = ca.0.min(cb.0);
        let xb = west_col as f64 * s;
        let t = (xb - a.x) / (b.x - a.x);
        let yc = a.y + t * (b.y - a.y);
        let row_v = self
            .height
            .saturating_sub((yc / s).floor() as usize)
            .clamp(1, self.height);
        if self.wall(west_col, row_v, Side::East) == WallState::Present {
            return true;
        }

        // Horizontal boundary between the two rows
        let north_row = ca.1.min(cb.1);
        let yb = (self.height - north_row) as f64 * s;
        let t = (yb - a.y) / (b.y - a.y);
        let xc = a.x + t * (b.x - a.x);
        let col_h = (((xc / s).floor() as usize) + 1).min(self.width);
        self.wall(col_h, north_row, Side::South) == WallState::Present
    }

    /// Whether `p` lies on a painted stop strip (a band of fixed width
    /// centered on an edge marked Stop).
    pub fn stop_strip_at(&self, p: Point) -> bool {
        let Some((col, row)) = self.cell_at(p) else {
            return false;
        };
        Side::ALL.iter().any(|&side| {
            self.stop(col, row, side) == StopState::Stop
                && self.distance_to_side(p, col, row, side) <= STOP_STRIP_WIDTH / 2.0
        })
    }

    /// Whether `p` lies in a pickup zone (a band extending ZONE_DEPTH
    /// inward from an edge marked Pickup).
    pub fn pickup_zone_at(&self, p: Point) -> bool {
        self.zone_region_at(p, ZoneState::Pickup)
    }

    /// Whether `p` lies in a dropoff zone
    pub fn dropoff_zone_at(&self, p: Point) -> bool {
        self.zone_region_at(p, ZoneState::Dropoff)
    }

    fn zone_region_at(&self, p: Point, kind: ZoneState) -> bool {
        let Some((col, row)) = self.cell_at(p) else {
            return false;
        };
        Side::ALL.iter().any(|&side| {
            self.zone(col, row, side) == kind
                && self.distance_to_side(p, col, row, side) <= ZONE_DEPTH
        })
    }

    /// Surround the maze with walls. Layout files normally declare the
    /// perimeter themselves; this is a convenience for tests and default
    /// setups.
    pub fn close_perimeter(&mut self) {
        for col in 1..=self.width {
            self.set_wall(col, 1, Side::North, WallState::Present);
            self.set_wall(col, self.height, Side::South, WallState::Present);
        }
        for row in 1..=self.height {
            self.set_wall(1, row, Side::West, WallState::Present);
            self.set_wall(self.width, row, Side::East, WallState::Present);
        }
    }
}
