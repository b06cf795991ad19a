// Simulated vehicle: four motor channels, differential-drive pose
// integration with collision rollback, and the sensor suite
//
// Provides:
// - Per-tick physics stepping (motors, kinematics, wall collision)
// - Bump, floor-color, and ultrasonic sensor queries
// - Clutch gearing for the auxiliary motor channel

pub mod kinematics;
pub mod motor;

pub use kinematics::Pose;
pub use motor::{Motor, MotorState};

use tracing::{debug, warn};

use crate::config::{
    BUMP_REACH, ClutchConfig, ULTRASONIC_MAX, ULTRASONIC_MIN, ULTRASONIC_SPREAD_DEG, VehicleConfig,
};
use crate::maze::Maze;

/// Motor channel indices: ports A and B are the drive pair, C is the
/// auxiliary, D is the hidden clutch channel that gears C.
pub const MOTOR_LEFT: usize = 0;
pub const MOTOR_RIGHT: usize = 1;
pub const MOTOR_AUX: usize = 2;
pub const MOTOR_CLUTCH: usize = 3;

pub const MOTOR_COUNT: usize = 4;

/// Floor color codes as reported by the color sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FloorColor {
    None = 0,
    Black = 1,
    Blue = 2,
    Green = 3,
    Yellow = 4,
    Red = 5,
    White = 6,
    Brown = 7,
}

/// Direction multiplier the clutch gearing applies to the auxiliary
/// motor: the clutch motor's position selects the gear.
pub fn clutch_multiplier(clutch: &ClutchConfig, clutch_angle: f64) -> f64 {
    if !clutch.enabled {
        1.0
    } else if clutch_angle >= 0.0 {
        clutch.direction
    } else {
        -clutch.direction
    }
}

/// One simulated vehicle. Owns its four motors; the maze is borrowed per
/// query so sessions can share a single read-only maze.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pose: Pose,
    motors: [Motor; MOTOR_COUNT],
    config: VehicleConfig,
    colliding: bool,
}

impl Vehicle {
    /// Create a vehicle parked at its configured start cell.
    pub fn new(config: VehicleConfig, maze: &Maze) -> Self {
        let center = maze.cell_center(config.start.col, config.start.row);
        let pose = Pose::new(center.x, center.y, config.start.heading_deg);
        let motors = std::array::from_fn(|_| Motor::new(config.max_rpm));
        Self {
            pose,
            motors,
            config,
            colliding: false,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Reposition the vehicle (scenario setup; not reachable from the
    /// wire protocol).
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    pub fn motor(&self, index: usize) -> &Motor {
        &self.motors[index]
    }

    pub fn motor_mut(&mut self, index: usize) -> &mut Motor {
        &mut self.motors[index]
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn is_colliding(&self) -> bool {
        self.colliding
    }

    pub fn set_gear_ratio(&mut self, ratio: f64) {
        self.config.gear_ratio = ratio;
    }

    pub fn set_wheelbase(&mut self, wheelbase: f64) {
        self.config.wheelbase = wheelbase;
    }

    pub fn set_clutch(&mut self, enabled: bool, direction: f64) {
        self.config.clutch = ClutchConfig { enabled, direction };
    }

    /// Gearing multiplier currently applied to auxiliary-motor commands
    pub fn aux_direction(&self) -> f64 {
        clutch_multiplier(&self.config.clutch, self.motors[MOTOR_CLUTCH].angle())
    }

    /// Linear ground speed of a drive wheel, length units per second.
    /// A stopped motor contributes nothing regardless of its power.
    fn drive_speed(&self, index: usize) -> f64 {
        let m = &self.motors[index];
        if m.state() == MotorState::Stopped {
            return 0.0;
        }
        self.config.wheel_circumference * self.config.gear_ratio * self.config.max_rpm / 60.0
            * m.power()
            / 100.0
    }

    /// Fastest current drive wheel speed, for the session's adaptive tick
    pub fn fastest_drive_speed(&self) -> f64 {
        self.drive_speed(MOTOR_LEFT)
            .abs()
            .max(self.drive_speed(MOTOR_RIGHT).abs())
    }

    /// Advance the simulation by `dt` seconds. If the moved vehicle
    /// envelope crosses a wall the whole tick is rolled back, motors
    /// included; a blocked vehicle stays frozen until its commands change.
    pub fn tick(&mut self, maze: &Maze, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let snapshot = (self.pose, self.motors.clone());

        for m in &mut self.motors {
            m.update(dt);
        }
        let left = self.drive_speed(MOTOR_LEFT);
        let right = self.drive_speed(MOTOR_RIGHT);
        self.pose = kinematics::step(self.pose, left, right, self.config.wheelbase, dt);

        if self.hits_wall(maze) {
            (self.pose, self.motors) = snapshot;
            if !self.colliding {
                warn!(
                    x = self.pose.position.x,
                    y = self.pose.position.y,
                    heading = self.pose.heading_deg,
                    "vehicle hit a wall, motion blocked"
                );
                self.colliding = true;
            }
        } else if self.colliding {
            debug!("vehicle cleared the wall");
            self.colliding = false;
        }
    }

    /// Whether any edge of the body envelope crosses a wall
    fn hits_wall(&self, maze: &Maze) -> bool {
        let b = self.config.body;
        let fl = self.pose.body_to_world(b.front, b.half_width);
        let fr = self.pose.body_to_world(b.front, -b.half_width);
        let rl = self.pose.body_to_world(-b.rear, b.half_width);
        let rr = self.pose.body_to_world(-b.rear, -b.half_width);
        maze.segment_crosses_wall(fl, fr)
            || maze.segment_crosses_wall(rl, rr)
            || maze.segment_crosses_wall(fl, rl)
            || maze.segment_crosses_wall(fr, rr)
    }

    /// Bump sensor: pressed when the feeler segment reaching back from
    /// its mount point crosses a wall
    pub fn bump(&self, maze: &Maze, index: usize) -> bool {
        let Some(mount) = self.config.sensors.bump.get(index) else {
            return false;
        };
        let tip = self.pose.body_to_world(mount.x, mount.y);
        let tail = tip.along(self.pose.heading_deg + 180.0, BUMP_REACH);
        maze.segment_crosses_wall(tip, tail)
    }

    /// Classify the floor under the color sensor. A stop strip wins over
    /// any load zone it overlaps.
    pub fn floor_color(&self, maze: &Maze) -> FloorColor {
        let offs = self.config.sensors.color;
        let p = self.pose.body_to_world(offs.x, offs.y);
        if maze.stop_strip_at(p) {
            FloorColor::Red
        } else if maze.pickup_zone_at(p) {
            FloorColor::Green
        } else if maze.dropoff_zone_at(p) {
            FloorColor::Blue
        } else {
            FloorColor::White
        }
    }

    /// Ultrasonic range reading: three rays across the beam spread, each
    /// corrected for grazing incidence, averaged and clamped into the
    /// sensor's reporting range.
    pub fn ultrasonic(&self, maze: &Maze) -> f64 {
        let offs = self.config.sensors.ultrasonic;
        let origin = self.pose.body_to_world(offs.x, offs.y);
        let beam = self.pose.heading_deg + self.config.sensors.ultrasonic_mount_deg;

        let mut sum = 0.0;
        for spread in [-ULTRASONIC_SPREAD_DEG, 0.0, ULTRASONIC_SPREAD_DEG] {
            let reading = match maze.closest_wall(origin, beam + spread) {
                Some(hit) if hit.incidence_deg < 45.0 => {
                    // A grazing echo scatters away and reads long
                    hit.distance.powf(1.0 + (45.0 - hit.incidence_deg) / 180.0)
                }
                Some(hit) => hit.distance,
                None => ULTRASONIC_MAX,
            };
            sum += reading;
        }
        (sum / 3.0).clamp(ULTRASONIC_MIN, ULTRASONIC_MAX)
    }
}
