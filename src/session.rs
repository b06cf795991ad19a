// Per-connection session: the bridge between one TCP client and one
// simulated vehicle
//
// Each session runs its own adaptive fixed-step loop: advance the physics
// by one tick, then poll for at most one pending command line, dispatch
// it, and write the response. Commands never interleave with a physics
// step, and sessions share nothing but the read-only maze.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info};

use crate::config::{self, VehicleConfig};
use crate::maze::Maze;
use crate::protocol::{self, Command, Response};
use crate::vehicle::{MOTOR_AUX, MOTOR_COUNT, Vehicle};

/// One client's simulation state: the vehicle plus a handle to the shared
/// maze. Command dispatch is synchronous so it can be tested without a
/// socket.
pub struct Session {
    vehicle: Vehicle,
    maze: Arc<Maze>,
}

impl Session {
    pub fn new(maze: Arc<Maze>, vehicle_config: VehicleConfig) -> Self {
        let vehicle = Vehicle::new(vehicle_config, &maze);
        Self { vehicle, maze }
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    /// Length of the next physics tick. Runs at the base rate when slow,
    /// but never lets the vehicle travel more than MAX_TICK_TRAVEL in one
    /// tick, so walls and bump strips cannot be skipped over.
    fn next_tick(&self) -> Duration {
        let fastest = self.vehicle.fastest_drive_speed();
        if fastest <= 0.0 {
            return config::BASE_TICK;
        }
        Duration::from_secs_f64(config::MAX_TICK_TRAVEL / fastest)
            .clamp(config::MIN_TICK, config::BASE_TICK)
    }

    fn step(&mut self, dt: f64) {
        self.vehicle.tick(&self.maze, dt);
    }

    /// Route one decoded command to the vehicle/motor API and produce its
    /// response line.
    pub fn dispatch(&mut self, cmd: Command) -> Response {
        match cmd {
            Command::InputReadSi { port, mode: _ } => self.read_sensor(port),
            Command::MotorBusy { nos } => {
                let busy = selected(nos).any(|i| self.vehicle.motor(i).is_busy());
                Response::Int(busy as i64)
            }
            Command::MotorGetCount { motor } => Response::Float(self.vehicle.motor(motor).angle()),
            Command::MotorStop { nos } => {
                for i in selected(nos) {
                    self.vehicle.motor_mut(i).stop();
                }
                Response::ACK
            }
            Command::MotorPower { nos, power } => {
                for i in selected(nos) {
                    let power = self.geared_power(i, power);
                    self.vehicle.motor_mut(i).set_power(power);
                }
                Response::ACK
            }
            Command::MotorStart { nos } => {
                for i in selected(nos) {
                    self.vehicle.motor_mut(i).start();
                }
                Response::ACK
            }
            Command::MotorStepSpeed {
                nos,
                power,
                step1,
                step2,
                step3,
            } => {
                for i in selected(nos) {
                    let power = self.geared_power(i, power);
                    self.vehicle.motor_mut(i).start_profile(power, step1, step2, step3);
                }
                Response::ACK
            }
            Command::MotorClrCount { nos } => {
                for i in selected(nos) {
                    self.vehicle.motor_mut(i).clear_count();
                }
                Response::ACK
            }
            Command::SimulateClutch { enabled, direction } => {
                self.vehicle.set_clutch(enabled, direction);
                Response::ACK
            }
            Command::MotorRange { motor, min, max } => {
                self.vehicle.motor_mut(motor).set_range(min, max);
                Response::ACK
            }
            Command::DriveGearRatio {
                numerator,
                denominator,
            } => {
                self.vehicle.set_gear_ratio(numerator / denominator);
                Response::ACK
            }
            Command::EffectiveWheelbase { value } => {
                if value <= 0.0 {
                    return Response::Error;
                }
                self.vehicle.set_wheelbase(value);
                Response::ACK
            }
            Command::End => Response::ACK,
        }
    }

    /// Sensor port map: 1 and 2 are the bump feelers, 3 the color sensor,
    /// 4 the ultrasonic ranger.
    fn read_sensor(&self, port: u8) -> Response {
        match port {
            1 => Response::Int(self.vehicle.bump(&self.maze, 0) as i64),
            2 => Response::Int(self.vehicle.bump(&self.maze, 1) as i64),
            3 => Response::Int(self.vehicle.floor_color(&self.maze) as u8 as i64),
            4 => Response::Float(self.vehicle.ultrasonic(&self.maze)),
            _ => Response::Error,
        }
    }

    /// Power as actually applied to a channel: the auxiliary motor is
    /// geared through the clutch, every other channel is direct.
    fn geared_power(&self, index: usize, power: f64) -> f64 {
        if index == MOTOR_AUX {
            power * self.vehicle.aux_direction()
        } else {
            power
        }
    }
}

/// Motor channels selected by a NOS bitfield, lowest port first
fn selected(nos: u8) -> impl Iterator<Item = usize> {
    (0..MOTOR_COUNT).filter(move |i| nos & (1 << i) != 0)
}

/// Drive one accepted connection to completion.
pub async fn run(
    stream: TcpStream,
    maze: Arc<Maze>,
    vehicle_config: VehicleConfig,
) -> std::io::Result<()> {
    let peer = stream.peer_addr()?;
    let (read_half, mut writer) = stream.into_split();

    // A detached reader feeds inbound lines through a channel the tick
    // loop polls, so reads never block a physics step
    let (tx, mut lines) = mpsc::channel::<String>(config::CMD_CHANNEL_CAPACITY);
    tokio::spawn(read_lines(read_half, tx));

    let mut session = Session::new(maze, vehicle_config);
    info!(%peer, "session started");

    loop {
        let tick = session.next_tick();
        tokio::time::sleep(tick).await;
        session.step(tick.as_secs_f64());

        match lines.try_recv() {
            Ok(line) => {
                if handle_line(&mut session, &line, &mut writer).await? {
                    break;
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                debug!(%peer, "connection closed");
                break;
            }
        }
    }

    info!(%peer, "session ended");
    Ok(())
}

/// Decode and dispatch one request line. Returns true when the client
/// asked to end the session.
async fn handle_line(
    session: &mut Session,
    line: &str,
    writer: &mut OwnedWriteHalf,
) -> std::io::Result<bool> {
    match protocol::parse(line) {
        Ok(Some(cmd)) => {
            let ending = matches!(cmd, Command::End);
            let response = session.dispatch(cmd);
            writer.write_all(format!("{response}\n").as_bytes()).await?;
            Ok(ending)
        }
        Ok(None) => {
            // Unknown verbs are dropped without a response, like the real
            // controller
            debug!(line, "ignoring unrecognized command");
            Ok(false)
        }
        Err(e) => {
            debug!(error = %e, "malformed request");
            writer
                .write_all(format!("{}\n", Response::Error).as_bytes())
                .await?;
            Ok(false)
        }
    }
}

async fn read_lines(read_half: OwnedReadHalf, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    break; // session is gone
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "socket read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::{Side, StopState};
    use crate::vehicle::{MOTOR_CLUTCH, MOTOR_LEFT, MOTOR_RIGHT, MotorState};
    use approx::assert_relative_eq;

    fn session() -> Session {
        let mut maze = Maze::new(5, 5, 24.0);
        maze.close_perimeter();
        Session::new(Arc::new(maze), VehicleConfig::default())
    }

    fn cmd(line: &str) -> Command {
        protocol::parse(line).unwrap().expect("known command")
    }

    #[test]
    fn motor_power_respects_nos_bitfield() {
        let mut s = session();
        assert_eq!(s.dispatch(cmd("SET motorPower 1 60")), Response::ACK);
        assert_eq!(s.vehicle.motor(MOTOR_LEFT).power(), 60.0);
        assert_eq!(s.vehicle.motor(MOTOR_RIGHT).power(), 0.0);

        s.dispatch(cmd("SET motorPower 2 -30"));
        assert_eq!(s.vehicle.motor(MOTOR_RIGHT).power(), -30.0);
    }

    #[test]
    fn motor_start_and_stop_drive_the_state_machine() {
        let mut s = session();
        s.dispatch(cmd("SET motorPower 3 40"));
        s.dispatch(cmd("SET motorStart 3"));
        assert_eq!(s.vehicle.motor(MOTOR_LEFT).state(), MotorState::Running);
        assert_eq!(s.vehicle.motor(MOTOR_RIGHT).state(), MotorState::Running);

        s.dispatch(cmd("SET motorStop 3"));
        assert_eq!(s.vehicle.motor(MOTOR_LEFT).state(), MotorState::Stopped);
        assert_eq!(s.vehicle.motor(MOTOR_LEFT).power(), 0.0);
    }

    #[test]
    fn motor_busy_reports_any_selected_channel() {
        let mut s = session();
        assert_eq!(s.dispatch(cmd("GET motorBusy 3")), Response::Int(0));

        s.dispatch(cmd("SET motorStepSpeed 1 50 90 360 90"));
        assert_eq!(s.dispatch(cmd("GET motorBusy 3")), Response::Int(1));
        assert_eq!(s.dispatch(cmd("GET motorBusy 2")), Response::Int(0));
    }

    #[test]
    fn motor_get_count_reads_the_angle() {
        let mut s = session();
        s.dispatch(cmd("SET motorPower 1 50"));
        s.dispatch(cmd("SET motorStart 1"));
        s.step(1.0);
        match s.dispatch(cmd("GET motorGetCount 0")) {
            Response::Float(angle) => assert_relative_eq!(angle, 510.0, epsilon = 1e-6),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn clutch_gears_the_auxiliary_channel_only() {
        let mut s = session();
        s.dispatch(cmd("SET simulateClutch 1 -1"));
        // Clutch motor rests at angle 0, so the multiplier is -1
        s.dispatch(cmd("SET motorPower 4 50"));
        assert_eq!(s.vehicle.motor(MOTOR_AUX).power(), -50.0);

        // Swing the clutch motor negative: multiplier flips to +1
        s.vehicle.motor_mut(MOTOR_CLUTCH).set_range(-180.0, -90.0);
        s.dispatch(cmd("SET motorPower 4 50"));
        assert_eq!(s.vehicle.motor(MOTOR_AUX).power(), 50.0);

        // Drive channels are never geared
        s.dispatch(cmd("SET motorPower 1 50"));
        assert_eq!(s.vehicle.motor(MOTOR_LEFT).power(), 50.0);
    }

    #[test]
    fn sensors_answer_on_their_ports() {
        let mut s = session();
        assert_eq!(s.dispatch(cmd("GET inputReadSI 1 0")), Response::Int(0));
        assert_eq!(s.dispatch(cmd("GET inputReadSI 2 0")), Response::Int(0));
        // Plain floor in the middle of the maze
        assert_eq!(s.dispatch(cmd("GET inputReadSI 3 0")), Response::Int(6));
        match s.dispatch(cmd("GET inputReadSI 4 0")) {
            Response::Float(d) => assert!((3.0..=255.0).contains(&d)),
            other => panic!("unexpected response {other:?}"),
        }
        // Ports outside 1..=4 are an error, not a silent drop
        assert_eq!(s.dispatch(cmd("GET inputReadSI 9 0")), Response::Error);
    }

    #[test]
    fn color_sensor_sees_stop_strip_through_dispatch() {
        let mut maze = Maze::new(5, 5, 24.0);
        maze.set_stop(1, 1, Side::South, StopState::Stop);
        let mut s = Session::new(Arc::new(maze), VehicleConfig::default());

        // Drive south from the cell center until the sensor crosses the
        // strip at the cell's south edge
        s.dispatch(cmd("SET motorPower 3 30"));
        s.dispatch(cmd("SET motorStart 3"));
        let mut saw_red = false;
        for _ in 0..400 {
            s.step(0.01);
            if s.dispatch(cmd("GET inputReadSI 3 0")) == Response::Int(5) {
                saw_red = true;
                break;
            }
        }
        assert!(saw_red, "color sensor never crossed the stop strip");
    }

    #[test]
    fn drive_geometry_commands_update_the_config() {
        let mut s = session();
        assert_eq!(s.dispatch(cmd("SET driveGearRatio 2 3")), Response::ACK);
        assert_relative_eq!(s.vehicle.config().gear_ratio, 2.0 / 3.0);

        assert_eq!(s.dispatch(cmd("SET effectiveWheelbase 5.25")), Response::ACK);
        assert_eq!(s.vehicle.config().wheelbase, 5.25);

        assert_eq!(s.dispatch(cmd("SET effectiveWheelbase -1")), Response::Error);
        assert_eq!(s.vehicle.config().wheelbase, 5.25);
    }

    #[test]
    fn motor_range_centers_and_limits() {
        let mut s = session();
        s.dispatch(cmd("SET motorRange 2 -90 90"));
        assert_eq!(s.vehicle.motor(MOTOR_AUX).angle(), 0.0);
        assert_eq!(s.vehicle.motor(MOTOR_AUX).range(), Some((-90.0, 90.0)));
    }

    #[test]
    fn clear_count_zeroes_through_dispatch() {
        let mut s = session();
        s.dispatch(cmd("SET motorPower 1 50"));
        s.dispatch(cmd("SET motorStart 1"));
        s.step(0.5);
        assert!(s.vehicle.motor(MOTOR_LEFT).angle() > 0.0);

        s.dispatch(cmd("SET motorClrCount 1"));
        assert_eq!(s.vehicle.motor(MOTOR_LEFT).angle(), 0.0);
    }
}
