// Differential drive kinematics
//
// Converts the two drive wheels' linear speeds over one tick into a pose
// update. Four motion regimes: straight translation, pure pivot, an arc
// about the instantaneous turn center, and a sequential composite for
// opposite-spinning wheels of unequal magnitude.

use crate::maze::Point;

/// Vehicle pose in the world frame. Heading is degrees counter-clockwise
/// from east and unbounded (it accumulates across full turns).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Point,
    pub heading_deg: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading_deg: f64) -> Self {
        Self {
            position: Point::new(x, y),
            heading_deg,
        }
    }

    /// Map a body-frame offset (x forward, y left) into the world frame.
    pub fn body_to_world(&self, forward: f64, left: f64) -> Point {
        let (sin, cos) = self.heading_deg.to_radians().sin_cos();
        Point::new(
            self.position.x + forward * cos - left * sin,
            self.position.y + forward * sin + left * cos,
        )
    }
}

const SPEED_EPS: f64 = 1e-9;

/// Advance `pose` by one tick given the drive wheels' linear speeds
/// (length units per second, signed forward-positive).
pub fn step(pose: Pose, left: f64, right: f64, wheelbase: f64, dt: f64) -> Pose {
    if left.abs() < SPEED_EPS && right.abs() < SPEED_EPS {
        pose
    } else if (left - right).abs() < SPEED_EPS {
        straight(pose, left * dt)
    } else if (left + right).abs() < SPEED_EPS {
        pivot(pose, left * dt, wheelbase)
    } else if left * right >= 0.0 {
        arc(pose, left, right, wheelbase, dt)
    } else {
        composite(pose, left, right, wheelbase, dt)
    }
}

fn straight(pose: Pose, dist: f64) -> Pose {
    Pose {
        position: pose.position.along(pose.heading_deg, dist),
        heading_deg: pose.heading_deg,
    }
}

/// Spin in place. `left_dist` is the left wheel's signed travel; a forward
/// left wheel turns the vehicle clockwise (negative heading change).
fn pivot(pose: Pose, left_dist: f64, wheelbase: f64) -> Pose {
    Pose {
        position: pose.position,
        heading_deg: pose.heading_deg - 360.0 * left_dist / (wheelbase * std::f64::consts::PI),
    }
}

/// Arc about the instantaneous center on the wheel axis. Valid whenever
/// the wheel speeds differ; also covers the one-wheel-stationary case.
fn arc(pose: Pose, left: f64, right: f64, wheelbase: f64, dt: f64) -> Pose {
    let omega = (right - left) / wheelbase; // rad/s, counter-clockwise
    let radius = (wheelbase / 2.0) * (left + right) / (right - left);

    let h = pose.heading_deg.to_radians();
    let center = Point::new(
        pose.position.x - radius * h.sin(),
        pose.position.y + radius * h.cos(),
    );
    let dtheta_deg = (omega * dt).to_degrees();
    Pose {
        position: pose.position.rotated_about(center, dtheta_deg),
        heading_deg: pose.heading_deg + dtheta_deg,
    }
}

/// Opposite-spinning wheels of unequal magnitude: cancel the balanced
/// opposite pair, arc the excess speed on the dominant wheel, then apply
/// the cancelled pair as a pure pivot. Both parts run within the tick.
fn composite(pose: Pose, left: f64, right: f64, wheelbase: f64, dt: f64) -> Pose {
    let excess = left + right;
    let (mid, pivot_left) = if left.abs() >= right.abs() {
        (arc(pose, excess, 0.0, wheelbase, dt), -right)
    } else {
        (arc(pose, 0.0, excess, wheelbase, dt), left)
    };
    pivot(mid, pivot_left * dt, wheelbase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const WHEELBASE: f64 = 4.5;

    #[test]
    fn equal_speeds_translate_along_heading() {
        // Facing south: forward motion is -y
        let pose = step(Pose::new(12.0, 100.0, 270.0), 9.81, 9.81, WHEELBASE, 1.0);
        assert_relative_eq!(pose.position.x, 12.0, epsilon = 1e-9);
        assert_relative_eq!(pose.position.y, 100.0 - 9.81, epsilon = 1e-9);
        assert_relative_eq!(pose.heading_deg, 270.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_speeds_hold_pose() {
        let start = Pose::new(5.0, 5.0, 33.0);
        let pose = step(start, 0.0, 0.0, WHEELBASE, 10.0);
        assert_eq!(pose, start);
    }

    #[test]
    fn opposite_speeds_pivot_in_place() {
        let start = Pose::new(7.0, 9.0, 90.0);
        let pose = step(start, 5.0, -5.0, WHEELBASE, 0.5);
        assert_relative_eq!(pose.position.x, 7.0, epsilon = 1e-9);
        assert_relative_eq!(pose.position.y, 9.0, epsilon = 1e-9);
        // Forward left wheel turns clockwise
        let expected = 90.0 - 360.0 * 2.5 / (WHEELBASE * std::f64::consts::PI);
        assert_relative_eq!(pose.heading_deg, expected, epsilon = 1e-9);
    }

    #[test]
    fn faster_right_wheel_arcs_left() {
        let start = Pose::new(0.0, 0.0, 0.0);
        let pose = step(start, 5.0, 10.0, WHEELBASE, 0.2);
        assert!(pose.heading_deg > 0.0);
        assert!(pose.position.x > 0.0, "still makes forward progress");
        assert!(pose.position.y > 0.0, "drifts toward the turn side");
    }

    #[test]
    fn near_balanced_opposite_pair_behaves_like_pivot() {
        // An almost-balanced opposite pair behaves like a pivot
        let start = Pose::new(3.0, 4.0, 10.0);
        let arced = step(start, 5.0, -5.0 + 1e-7, WHEELBASE, 0.1);
        let pivoted = step(start, 5.0, -5.0, WHEELBASE, 0.1);
        assert_relative_eq!(arced.heading_deg, pivoted.heading_deg, epsilon = 1e-4);
        assert_relative_eq!(arced.position.x, pivoted.position.x, epsilon = 1e-4);
    }

    #[test]
    fn one_stationary_wheel_turns_about_it() {
        // Left wheel stopped, right driving: the left wheel's ground point
        // should stay put while the vehicle turns counter-clockwise
        let start = Pose::new(0.0, 0.0, 0.0);
        let pose = step(start, 0.0, 8.0, WHEELBASE, 0.25);
        assert!(pose.heading_deg > 0.0);

        let left_wheel_before = start.body_to_world(0.0, WHEELBASE / 2.0);
        let left_wheel_after = pose.body_to_world(0.0, WHEELBASE / 2.0);
        assert_relative_eq!(left_wheel_before.x, left_wheel_after.x, epsilon = 1e-9);
        assert_relative_eq!(left_wheel_before.y, left_wheel_after.y, epsilon = 1e-9);
    }

    #[test]
    fn unbalanced_opposite_wheels_turn_toward_net_reverse() {
        // Left +30, right -50: both the excess arc and the pivot rotate
        // clockwise
        let start = Pose::new(0.0, 0.0, 0.0);
        let pose = step(start, 3.0, -5.0, WHEELBASE, 0.2);
        assert!(pose.heading_deg < 0.0);
        // Position barely moves: only the small excess translates
        assert!(pose.position.distance_to(start.position) < 3.0 * 0.2);
    }

    #[test]
    fn body_to_world_rotates_offsets() {
        let pose = Pose::new(10.0, 10.0, 90.0);
        // Facing north: forward is +y, left is -x
        let p = pose.body_to_world(2.0, 1.0);
        assert_relative_eq!(p.x, 9.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 12.0, epsilon = 1e-9);
    }
}
