// Motor ramp state machine
//
// A motor integrates an angle counter (degrees) from its commanded power.
// Plain start/stop runs at constant speed; a speed-step command runs a
// three-phase ramp profile (accelerate over s1 degrees, hold over s2,
// decelerate over s3) after which the motor stops on its own. Optional
// travel-limit stops clamp the angle and pin the motor against them.

/// Phase of a motor. `Ramp1`/`Steady`/`Ramp2` are the profile phases;
/// the motor reports busy while in any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Stopped,
    Running,
    Ramp1,
    Steady,
    Ramp2,
}

/// Parameters of an active ramp profile. Boundary angles are absolute
/// (relative to the angle at which the profile started) and signed by the
/// profile direction.
#[derive(Debug, Clone, Copy, Default)]
struct RampProfile {
    /// Power change per second during ramp-up
    r1_slope: f64,
    /// Power change per second during ramp-down
    r2_slope: f64,
    steady_power: f64,
    boundary1: f64,
    boundary2: f64,
    boundary3: f64,
    /// +1.0 forward, -1.0 reverse
    dir: f64,
}

/// One simulated motor channel.
#[derive(Debug, Clone)]
pub struct Motor {
    power: f64,
    angle: f64,
    state: MotorState,
    max_rpm: f64,
    ramp: RampProfile,
    range: Option<(f64, f64)>,
}

impl Motor {
    pub fn new(max_rpm: f64) -> Self {
        Self {
            power: 0.0,
            angle: 0.0,
            state: MotorState::Stopped,
            max_rpm,
            ramp: RampProfile::default(),
            range: None,
        }
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    /// Busy means a ramp profile is in progress. A plainly Running motor
    /// is not busy; it keeps running until told otherwise.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            MotorState::Ramp1 | MotorState::Steady | MotorState::Ramp2
        )
    }

    /// Degrees per second per unit of power
    fn deg_per_power(&self) -> f64 {
        6.0 * self.max_rpm / 100.0
    }

    /// Set the commanded power. Ignored while a profile is running.
    pub fn set_power(&mut self, power: f64) {
        if !self.is_busy() {
            self.power = power.clamp(-100.0, 100.0);
        }
    }

    /// Start running at the current power. Ignored while busy.
    pub fn start(&mut self) {
        if !self.is_busy() {
            self.state = MotorState::Running;
        }
    }

    /// Force the motor to a stop, clearing power. Valid in any state.
    pub fn stop(&mut self) {
        self.state = MotorState::Stopped;
        self.power = 0.0;
    }

    /// Begin a three-phase ramp profile: accelerate from the current power
    /// to `power` over `s1` degrees, hold for `s2` degrees, decelerate to
    /// zero over `s3` degrees. The sign of `power` sets the direction of
    /// all three boundaries. Restarts the profile from any state.
    pub fn start_profile(&mut self, power: f64, s1: f64, s2: f64, s3: f64) {
        let power = power.clamp(-100.0, 100.0);
        if power == 0.0 {
            self.stop();
            return;
        }
        let dir = if power < 0.0 { -1.0 } else { 1.0 };
        let (s1, s2, s3) = (s1.max(0.0), s2.max(0.0), s3.max(0.0));
        let k = self.deg_per_power();

        let boundary1 = self.angle + dir * s1;
        let boundary2 = boundary1 + dir * s2;
        let boundary3 = boundary2 + dir * s3;

        // Constant power slope that sweeps exactly s1 degrees while the
        // power moves from its current value to the target:
        //   swept = k * (target^2 - current^2) / (2 * slope)
        let r1_slope = if s1 > 0.0 {
            k * (power * power - self.power * self.power) / (2.0 * dir * s1)
        } else {
            0.0
        };
        // A zero slope cannot reach the target power; jump to it instead
        // (covers s1 == 0 and a current power that already matches)
        if r1_slope == 0.0 {
            self.power = power;
        }
        let r2_slope = if s3 > 0.0 {
            -k * power * power / (2.0 * dir * s3)
        } else {
            0.0
        };

        self.ramp = RampProfile {
            r1_slope,
            r2_slope,
            steady_power: power,
            boundary1,
            boundary2,
            boundary3,
            dir,
        };
        self.state = MotorState::Ramp1;
    }

    /// Reset the angle counter to zero, shifting any travel limits by the
    /// same amount so they stay put physically. Ignored while busy.
    pub fn clear_count(&mut self) {
        if self.is_busy() {
            return;
        }
        let delta = self.angle;
        self.angle = 0.0;
        if let Some((lo, hi)) = self.range {
            self.range = Some((lo - delta, hi - delta));
        }
    }

    /// Install travel limits and center the angle between them.
    pub fn set_range(&mut self, min: f64, max: f64) {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.range = Some((lo, hi));
        self.angle = (lo + hi) / 2.0;
    }

    /// Advance the motor by `dt` seconds: integrate the angle under the
    /// current phase's kinematics, clamp to travel limits, and cross phase
    /// boundaries. A clamped motor does not advance past its stop into the
    /// next phase, and its power holds for that tick.
    pub fn update(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let k = self.deg_per_power();
        let pre_angle = self.angle;
        let pre_power = self.power;

        match self.state {
            MotorState::Stopped => return,
            MotorState::Running => {
                self.angle += k * self.power * dt;
            }
            MotorState::Steady => {
                self.angle += k * self.ramp.steady_power * dt;
            }
            MotorState::Ramp1 => {
                let a = self.ramp.r1_slope;
                self.angle += k * (self.power * dt + 0.5 * a * dt * dt);
                self.power = (self.power + a * dt).clamp(-100.0, 100.0);
            }
            MotorState::Ramp2 => {
                let a = self.ramp.r2_slope;
                self.angle += k * (self.power * dt + 0.5 * a * dt * dt);
                self.power = (self.power + a * dt).clamp(-100.0, 100.0);
            }
        }

        if self.clamp_to_range(pre_power) {
            return;
        }
        self.state = self.crossed_boundary(pre_angle, pre_power, dt);
    }

    /// Clamp the angle into the travel limits. Returns true when the motor
    /// is pinned against a stop this tick.
    fn clamp_to_range(&mut self, pre_power: f64) -> bool {
        let Some((lo, hi)) = self.range else {
            return false;
        };
        if self.angle < lo {
            self.angle = lo;
        } else if self.angle > hi {
            self.angle = hi;
        } else {
            return false;
        }
        self.power = pre_power;
        true
    }

    /// Phase-transition step: if the integration carried the angle across
    /// the current phase's boundary, land exactly on the boundary and move
    /// to the next phase, interpolating the crossing time linearly to
    /// recover the power at the boundary.
    fn crossed_boundary(&mut self, pre_angle: f64, pre_power: f64, dt: f64) -> MotorState {
        let dir = self.ramp.dir;
        let reached = |angle: f64, boundary: f64| {
            if dir >= 0.0 {
                angle >= boundary
            } else {
                angle <= boundary
            }
        };

        match self.state {
            MotorState::Ramp1 if reached(self.angle, self.ramp.boundary1) => {
                let t = crossing_fraction(pre_angle, self.angle, self.ramp.boundary1) * dt;
                self.power = (pre_power + self.ramp.r1_slope * t).clamp(-100.0, 100.0);
                self.angle = self.ramp.boundary1;
                MotorState::Steady
            }
            MotorState::Steady if reached(self.angle, self.ramp.boundary2) => {
                self.angle = self.ramp.boundary2;
                MotorState::Ramp2
            }
            MotorState::Ramp2 if reached(self.angle, self.ramp.boundary3) => {
                self.angle = self.ramp.boundary3;
                self.power = 0.0;
                MotorState::Stopped
            }
            state => state,
        }
    }
}

/// Fraction of the tick at which the angle crossed `boundary`, by linear
/// interpolation between the pre- and post-integration angles.
fn crossing_fraction(pre: f64, post: f64, boundary: f64) -> f64 {
    let span = post - pre;
    if span.abs() < 1e-12 {
        return 1.0;
    }
    ((boundary - pre) / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f64 = 0.002;

    fn motor() -> Motor {
        Motor::new(170.0)
    }

    fn run_until_stopped(m: &mut Motor) -> usize {
        for i in 0..1_000_000 {
            if m.state() == MotorState::Stopped {
                return i;
            }
            m.update(DT);
        }
        panic!("motor never stopped, state {:?}", m.state());
    }

    #[test]
    fn busy_only_in_profile_phases() {
        let mut m = motor();
        assert!(!m.is_busy());

        m.set_power(30.0);
        m.start();
        assert_eq!(m.state(), MotorState::Running);
        assert!(!m.is_busy());

        m.start_profile(30.0, 90.0, 180.0, 90.0);
        assert_eq!(m.state(), MotorState::Ramp1);
        assert!(m.is_busy());
    }

    #[test]
    fn stop_forces_stopped_and_clears_power() {
        let mut m = motor();
        m.start_profile(50.0, 90.0, 360.0, 90.0);
        m.update(DT);
        m.stop();
        assert_eq!(m.state(), MotorState::Stopped);
        assert_eq!(m.power(), 0.0);
    }

    #[test]
    fn set_power_ignored_while_busy() {
        let mut m = motor();
        m.start_profile(50.0, 90.0, 360.0, 90.0);
        let p = m.power();
        m.set_power(-80.0);
        assert_eq!(m.power(), p);

        m.stop();
        m.set_power(-80.0);
        assert_eq!(m.power(), -80.0);
    }

    #[test]
    fn running_integrates_constant_velocity() {
        // 170 rpm at 50% power is 510 deg/s
        let mut m = motor();
        m.set_power(50.0);
        m.start();
        for _ in 0..500 {
            m.update(DT);
        }
        assert_relative_eq!(m.angle(), 510.0, epsilon = 1e-6);
    }

    #[test]
    fn profile_traverses_exactly_its_phase_degrees() {
        let mut m = motor();
        m.start_profile(50.0, 90.0, 360.0, 90.0);
        run_until_stopped(&mut m);
        assert_relative_eq!(m.angle(), 540.0, epsilon = 1e-9);
        assert_eq!(m.power(), 0.0);
    }

    #[test]
    fn negative_profile_runs_in_reverse() {
        let mut m = motor();
        m.start_profile(-50.0, 90.0, 360.0, 90.0);
        run_until_stopped(&mut m);
        assert_relative_eq!(m.angle(), -540.0, epsilon = 1e-9);
    }

    #[test]
    fn profile_round_trip_returns_to_start() {
        let mut m = motor();
        m.start_profile(60.0, 45.0, 200.0, 45.0);
        run_until_stopped(&mut m);
        let mid = m.angle();
        m.start_profile(-60.0, 45.0, 200.0, 45.0);
        run_until_stopped(&mut m);
        assert_relative_eq!(m.angle(), mid - 290.0, epsilon = 1e-9);
        assert_relative_eq!(m.angle(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn speed_step_restarts_from_any_state() {
        let mut m = motor();
        m.start_profile(50.0, 90.0, 360.0, 90.0);
        for _ in 0..50 {
            m.update(DT);
        }
        assert!(m.is_busy());

        let here = m.angle();
        m.start_profile(30.0, 10.0, 20.0, 10.0);
        assert_eq!(m.state(), MotorState::Ramp1);
        run_until_stopped(&mut m);
        assert_relative_eq!(m.angle(), here + 40.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_power_profile_is_a_stop() {
        let mut m = motor();
        m.set_power(40.0);
        m.start();
        m.start_profile(0.0, 90.0, 90.0, 90.0);
        assert_eq!(m.state(), MotorState::Stopped);
        assert_eq!(m.power(), 0.0);
    }

    #[test]
    fn range_centers_angle_and_clamps() {
        let mut m = motor();
        m.set_range(-90.0, 90.0);
        assert_eq!(m.angle(), 0.0);

        m.set_power(100.0);
        m.start();
        for _ in 0..1000 {
            m.update(DT);
        }
        assert_eq!(m.angle(), 90.0);

        // Still pinned after more ticks
        m.update(DT);
        assert_eq!(m.angle(), 90.0);
    }

    #[test]
    fn clamp_blocks_phase_transitions() {
        let mut m = motor();
        m.set_range(-10.0, 10.0);
        m.start_profile(50.0, 90.0, 360.0, 90.0);
        for _ in 0..5000 {
            m.update(DT);
        }
        // The stop sits inside ramp-up; the motor stays busy against it
        assert_eq!(m.angle(), 10.0);
        assert_eq!(m.state(), MotorState::Ramp1);
        assert!(m.is_busy());
    }

    #[test]
    fn clear_count_rezeroes_and_shifts_range() {
        let mut m = motor();
        m.set_range(0.0, 100.0);
        assert_eq!(m.angle(), 50.0);

        m.clear_count();
        assert_eq!(m.angle(), 0.0);
        assert_eq!(m.range(), Some((-50.0, 50.0)));
    }

    #[test]
    fn clear_count_ignored_while_busy() {
        let mut m = motor();
        m.start_profile(50.0, 90.0, 360.0, 90.0);
        for _ in 0..100 {
            m.update(DT);
        }
        let angle = m.angle();
        m.clear_count();
        assert_eq!(m.angle(), angle);
    }
}
