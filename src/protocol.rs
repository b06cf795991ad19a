// Wire protocol: newline-terminated, space-delimited ASCII lines
//
// Requests are verb-first, `GET <op> <args...>` or `SET <op> <args...>`,
// answered with `RESP <value>` (SET commands acknowledge with `RESP 0`)
// or `RESP ERROR` for malformed arguments. Unrecognized opcodes are
// dropped without any response, matching the real controller firmware;
// clients must not block waiting for a reply to a verb the controller
// does not know.

use std::fmt;

/// A decoded request line. `nos` fields are the motor-select bitfield
/// (bit0 = port A .. bit3 = port D).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    InputReadSi {
        port: u8,
        mode: u8,
    },
    MotorBusy {
        nos: u8,
    },
    MotorGetCount {
        motor: usize,
    },
    MotorStop {
        nos: u8,
    },
    MotorPower {
        nos: u8,
        power: f64,
    },
    MotorStart {
        nos: u8,
    },
    MotorStepSpeed {
        nos: u8,
        power: f64,
        step1: f64,
        step2: f64,
        step3: f64,
    },
    MotorClrCount {
        nos: u8,
    },
    SimulateClutch {
        enabled: bool,
        direction: f64,
    },
    MotorRange {
        motor: usize,
        min: f64,
        max: f64,
    },
    DriveGearRatio {
        numerator: f64,
        denominator: f64,
    },
    EffectiveWheelbase {
        value: f64,
    },
    /// `SET end` / `SET disconnect`
    End,
}

/// Errors that earn a `RESP ERROR` (the session stays up)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("{op}: expected {expected} arguments, got {got}")]
    ArgCount {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{op}: invalid argument '{value}'")]
    BadArgument { op: &'static str, value: String },
}

/// A response line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    Int(i64),
    Float(f64),
    Error,
}

impl Response {
    /// Acknowledgement for SET commands
    pub const ACK: Response = Response::Int(0);
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Int(v) => write!(f, "RESP {v}"),
            Response::Float(v) => write!(f, "RESP {v:.4}"),
            Response::Error => write!(f, "RESP ERROR"),
        }
    }
}

/// Decode one request line. `Ok(None)` means the line is not a command
/// this controller knows and must be dropped silently.
pub fn parse(line: &str) -> Result<Option<Command>, ProtocolError> {
    let mut parts = line.split_whitespace();
    let (Some(verb), Some(op)) = (parts.next(), parts.next()) else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();

    let cmd = match (verb, op) {
        ("GET", "inputReadSI") => {
            let [port, mode] = take_args("inputReadSI", &args)?;
            Command::InputReadSi {
                port: arg("inputReadSI", port)?,
                mode: arg("inputReadSI", mode)?,
            }
        }
        ("GET", "motorBusy") => {
            let [nos] = take_args("motorBusy", &args)?;
            Command::MotorBusy {
                nos: arg("motorBusy", nos)?,
            }
        }
        ("GET", "motorGetCount") => {
            let [motor] = take_args("motorGetCount", &args)?;
            Command::MotorGetCount {
                motor: motor_index("motorGetCount", motor)?,
            }
        }
        ("SET", "motorStop") => {
            let [nos] = take_args("motorStop", &args)?;
            Command::MotorStop {
                nos: arg("motorStop", nos)?,
            }
        }
        ("SET", "motorPower") => {
            let [nos, power] = take_args("motorPower", &args)?;
            Command::MotorPower {
                nos: arg("motorPower", nos)?,
                power: arg("motorPower", power)?,
            }
        }
        ("SET", "motorStart") => {
            let [nos] = take_args("motorStart", &args)?;
            Command::MotorStart {
                nos: arg("motorStart", nos)?,
            }
        }
        ("SET", "motorStepSpeed") => {
            let [nos, power, s1, s2, s3] = take_args("motorStepSpeed", &args)?;
            Command::MotorStepSpeed {
                nos: arg("motorStepSpeed", nos)?,
                power: arg("motorStepSpeed", power)?,
                step1: arg("motorStepSpeed", s1)?,
                step2: arg("motorStepSpeed", s2)?,
                step3: arg("motorStepSpeed", s3)?,
            }
        }
        ("SET", "motorClrCount") => {
            let [nos] = take_args("motorClrCount", &args)?;
            Command::MotorClrCount {
                nos: arg("motorClrCount", nos)?,
            }
        }
        ("SET", "simulateClutch") => {
            let [enabled, direction] = take_args("simulateClutch", &args)?;
            let enabled: u8 = arg("simulateClutch", enabled)?;
            Command::SimulateClutch {
                enabled: enabled != 0,
                direction: arg("simulateClutch", direction)?,
            }
        }
        ("SET", "motorRange") => {
            let [motor, min, max] = take_args("motorRange", &args)?;
            Command::MotorRange {
                motor: motor_index("motorRange", motor)?,
                min: arg("motorRange", min)?,
                max: arg("motorRange", max)?,
            }
        }
        ("SET", "driveGearRatio") => {
            let [num, den] = take_args("driveGearRatio", &args)?;
            let denominator: f64 = arg("driveGearRatio", den)?;
            if denominator == 0.0 {
                return Err(ProtocolError::BadArgument {
                    op: "driveGearRatio",
                    value: den.to_string(),
                });
            }
            Command::DriveGearRatio {
                numerator: arg("driveGearRatio", num)?,
                denominator,
            }
        }
        ("SET", "effectiveWheelbase") => {
            let [value] = take_args("effectiveWheelbase", &args)?;
            Command::EffectiveWheelbase {
                value: arg("effectiveWheelbase", value)?,
            }
        }
        ("SET", "end") | ("SET", "disconnect") => {
            take_args::<0>(op_name(op), &args)?;
            Command::End
        }
        _ => return Ok(None),
    };
    Ok(Some(cmd))
}

fn op_name(op: &str) -> &'static str {
    if op == "disconnect" { "disconnect" } else { "end" }
}

fn take_args<'a, const N: usize>(
    op: &'static str,
    args: &[&'a str],
) -> Result<[&'a str; N], ProtocolError> {
    <[&str; N]>::try_from(args).map_err(|_| ProtocolError::ArgCount {
        op,
        expected: N,
        got: args.len(),
    })
}

fn arg<T: std::str::FromStr>(op: &'static str, value: &str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::BadArgument {
        op,
        value: value.to_string(),
    })
}

fn motor_index(op: &'static str, value: &str) -> Result<usize, ProtocolError> {
    let index: usize = arg(op, value)?;
    if index < crate::vehicle::MOTOR_COUNT {
        Ok(index)
    } else {
        Err(ProtocolError::BadArgument {
            op,
            value: value.to_string(),
        })
    }
}
