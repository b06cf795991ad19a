// 2D geometry primitives for the maze engine
//
// Walls are axis-aligned segments in the world frame. The only non-trivial
// primitive is the ray/segment intersection used by the ultrasonic sensor,
// which also reports the incidence angle between ray and wall.

/// A point (or displacement) in the world frame, in maze length units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point reached by travelling `dist` from here at `dir_deg`
    /// (degrees counter-clockwise from east).
    pub fn along(self, dir_deg: f64, dist: f64) -> Self {
        let (sin, cos) = dir_deg.to_radians().sin_cos();
        Self::new(self.x + dist * cos, self.y + dist * sin)
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let (dx, dy) = (other.x - self.x, other.y - self.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Rotate about `center` by `deg` counter-clockwise.
    pub fn rotated_about(self, center: Point, deg: f64) -> Self {
        let (sin, cos) = deg.to_radians().sin_cos();
        let (dx, dy) = (self.x - center.x, self.y - center.y);
        Self::new(center.x + dx * cos - dy * sin, center.y + dx * sin + dy * cos)
    }
}

/// A wall segment in the world frame.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub a: Point,
    pub b: Point,
}

impl Segment {
    pub fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }
}

/// A ray/wall intersection: how far along the ray the wall was hit, and the
/// acute angle (0..=90 degrees) between the ray and the wall line. 90 means
/// the ray hit the wall head-on, small values mean a grazing hit.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub distance: f64,
    pub incidence_deg: f64,
}

/// Cast a ray from `origin` at `dir_deg` against `seg`.
///
/// Returns `None` when the ray misses the segment or runs parallel to it.
pub fn ray_hit(origin: Point, dir_deg: f64, seg: Segment) -> Option<RayHit> {
    let (sin, cos) = dir_deg.to_radians().sin_cos();
    let (dx, dy) = (cos, sin);
    let (ex, ey) = (seg.b.x - seg.a.x, seg.b.y - seg.a.y);

    let denom = dx * ey - dy * ex;
    if denom.abs() < 1e-12 {
        return None;
    }

    let (ax, ay) = (seg.a.x - origin.x, seg.a.y - origin.y);
    let t = (ax * ey - ay * ex) / denom;
    let u = (ax * dy - ay * dx) / denom;
    if t < 0.0 || !(0.0..=1.0).contains(&u) {
        return None;
    }

    let seg_len = (ex * ex + ey * ey).sqrt();
    if seg_len < 1e-12 {
        return None;
    }
    let cos_between = ((dx * ex + dy * ey) / seg_len).abs().clamp(0.0, 1.0);
    Some(RayHit {
        distance: t,
        incidence_deg: cos_between.acos().to_degrees(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ray_hits_perpendicular_wall() {
        // Vertical wall 5 units east of the origin, ray pointing east
        let wall = Segment::new(Point::new(5.0, -2.0), Point::new(5.0, 2.0));
        let hit = ray_hit(Point::new(0.0, 0.0), 0.0, wall).expect("should hit");
        assert_relative_eq!(hit.distance, 5.0, epsilon = 1e-9);
        assert_relative_eq!(hit.incidence_deg, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn ray_reports_grazing_incidence() {
        // 30 degree ray against a horizontal wall gives a 30 degree incidence
        let wall = Segment::new(Point::new(-100.0, 10.0), Point::new(100.0, 10.0));
        let hit = ray_hit(Point::new(0.0, 0.0), 30.0, wall).expect("should hit");
        assert_relative_eq!(hit.incidence_deg, 30.0, epsilon = 1e-9);
        assert_relative_eq!(hit.distance, 10.0 / 30f64.to_radians().sin(), epsilon = 1e-9);
    }

    #[test]
    fn ray_misses_wall_behind_origin() {
        let wall = Segment::new(Point::new(-5.0, -2.0), Point::new(-5.0, 2.0));
        assert!(ray_hit(Point::new(0.0, 0.0), 0.0, wall).is_none());
    }

    #[test]
    fn ray_misses_short_segment() {
        // Wall exists only above the ray's path
        let wall = Segment::new(Point::new(5.0, 1.0), Point::new(5.0, 2.0));
        assert!(ray_hit(Point::new(0.0, 0.0), 0.0, wall).is_none());
    }

    #[test]
    fn rotation_about_center() {
        let p = Point::new(2.0, 0.0).rotated_about(Point::new(1.0, 0.0), 90.0);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-9);
    }
}
