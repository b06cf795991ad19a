// Tick rates, sensor limits, and vehicle configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Base session loop period (50 Hz). The session shortens individual ticks
// below this whenever the vehicle is fast enough that a full period would
// move it more than MAX_TICK_TRAVEL.
pub const BASE_TICK: Duration = Duration::from_millis(20);

// Floor for the adaptive tick, so a fast vehicle cannot spin the loop hot
pub const MIN_TICK: Duration = Duration::from_millis(2);

// Maximum distance the vehicle may travel in one tick, in maze length
// units. Keeps bump/collision detection from tunnelling through walls.
pub const MAX_TICK_TRAVEL: f64 = 0.25;

// How far behind its mount point a bump sensor's contact segment reaches
pub const BUMP_REACH: f64 = 1.0;

// Ultrasonic reading limits and the spread of the three cast rays
pub const ULTRASONIC_MIN: f64 = 3.0;
pub const ULTRASONIC_MAX: f64 = 255.0;
pub const ULTRASONIC_SPREAD_DEG: f64 = 2.0;

// Floor markings: a stop strip is painted centered on its wall line; load
// zones extend inward from their edge by a fixed depth.
pub const STOP_STRIP_WIDTH: f64 = 2.0;
pub const ZONE_DEPTH: f64 = 6.0;

// Pending command lines buffered per session before the reader blocks
pub const CMD_CHANNEL_CAPACITY: usize = 32;

/// A point in the vehicle body frame: x forward, y left, in maze length
/// units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct BodyPoint {
    pub x: f64,
    pub y: f64,
}

impl BodyPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Static vehicle parameters. Every field has a default matching the stock
/// classroom robot, so a config file only needs to name what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Drive wheel circumference, length units per revolution
    pub wheel_circumference: f64,
    /// Gear ratio between motor shaft and wheel
    pub gear_ratio: f64,
    /// Motor speed at 100% power, revolutions per minute
    pub max_rpm: f64,
    /// Effective distance between the two drive wheels
    pub wheelbase: f64,
    pub body: BodyEnvelope,
    pub sensors: SensorOffsets,
    pub start: StartPose,
    pub clutch: ClutchConfig,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            wheel_circumference: 6.926,
            gear_ratio: 1.0,
            max_rpm: 170.0,
            wheelbase: 4.5,
            body: BodyEnvelope::default(),
            sensors: SensorOffsets::default(),
            start: StartPose::default(),
            clutch: ClutchConfig::default(),
        }
    }
}

/// Rectangular collision envelope, extents from the wheelbase center
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyEnvelope {
    pub front: f64,
    pub rear: f64,
    pub half_width: f64,
}

impl Default for BodyEnvelope {
    fn default() -> Self {
        Self {
            front: 3.5,
            rear: 4.5,
            half_width: 3.5,
        }
    }
}

/// Sensor mount points in the body frame. The bump feelers protrude past
/// the front of the collision envelope, as on the real vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorOffsets {
    pub bump: [BodyPoint; 2],
    pub color: BodyPoint,
    pub ultrasonic: BodyPoint,
    /// Ultrasonic beam direction relative to the body, degrees (0 = forward)
    pub ultrasonic_mount_deg: f64,
}

impl Default for SensorOffsets {
    fn default() -> Self {
        Self {
            bump: [BodyPoint::new(4.0, 1.5), BodyPoint::new(4.0, -1.5)],
            color: BodyPoint::new(2.0, 0.0),
            ultrasonic: BodyPoint::new(3.0, 0.0),
            ultrasonic_mount_deg: 0.0,
        }
    }
}

/// Where a fresh session's vehicle is placed: centered in a cell, at a
/// given heading (degrees counter-clockwise from east, so 270 = south).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StartPose {
    pub col: usize,
    pub row: usize,
    pub heading_deg: f64,
}

impl Default for StartPose {
    fn default() -> Self {
        Self {
            col: 1,
            row: 1,
            heading_deg: 270.0,
        }
    }
}

/// Auxiliary-motor gearing. When enabled, commands addressed to the
/// auxiliary motor are direction-multiplied according to the clutch
/// motor's position (see [`crate::vehicle::clutch_multiplier`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ClutchConfig {
    pub enabled: bool,
    pub direction: f64,
}

impl Default for ClutchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            direction: 1.0,
        }
    }
}

/// Errors from loading a vehicle configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Load a vehicle configuration from a JSON file
pub fn load_vehicle_config(path: &Path) -> Result<VehicleConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: VehicleConfig =
            serde_json::from_str(r#"{ "wheelbase": 5.0, "start": { "heading_deg": 90.0 } }"#)
                .expect("valid config");
        assert_eq!(cfg.wheelbase, 5.0);
        assert_eq!(cfg.start.heading_deg, 90.0);
        // Untouched fields keep the stock values
        assert_eq!(cfg.max_rpm, 170.0);
        assert_eq!(cfg.start.col, 1);
        assert!(!cfg.clutch.enabled);
    }

    #[test]
    fn empty_config_is_valid() {
        let cfg: VehicleConfig = serde_json::from_str("{}").expect("valid config");
        assert_eq!(cfg.wheel_circumference, 6.926);
        assert_eq!(cfg.sensors.bump[0].x, 4.0);
    }
}
