// Keyboard teleop over the wire protocol: WASD drive, Z/X pivot,
// R/F speed, Q quit
//
// Doubles as an end-to-end protocol exerciser: it drives the motors with
// SET commands and polls the sensors with GET, printing every response
// the simulator sends back.
//
// Usage: cargo run --example teleop -- [addr]

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;

const SPEEDS: [f64; 3] = [25.0, 50.0, 100.0]; // percent power
const SENSOR_POLL: Duration = Duration::from_millis(500);

// NOS bitfields for the drive pair
const NOS_LEFT: u8 = 1;
const NOS_RIGHT: u8 = 2;
const NOS_DRIVE: u8 = NOS_LEFT | NOS_RIGHT;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9750".to_string());

    println!("Connecting to {addr}...");
    let stream = TcpStream::connect(&addr).await?;
    let (read_half, write_half) = stream.into_split();

    // Print everything the simulator says (raw mode needs explicit \r)
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            print!("<- {line}\r\n");
        }
    });

    println!("Controls: WASD=drive, Z/X=pivot, space=stop, R/F=speed, Q=quit");
    print_speed(0);

    enable_raw_mode()?;
    let result = run_teleop(write_half).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    mut writer: OwnedWriteHalf,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let mut last_poll = Instant::now();

    loop {
        // Poll for a key with a 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let p = SPEEDS[speed_idx];

                match code {
                    // Drive both wheels
                    KeyCode::Char('w') if pressed => {
                        drive(&mut writer, NOS_DRIVE, p).await?;
                    }
                    KeyCode::Char('s') if pressed => {
                        drive(&mut writer, NOS_DRIVE, -p).await?;
                    }

                    // Arc turns: only one wheel powered
                    KeyCode::Char('a') if pressed => {
                        drive(&mut writer, NOS_RIGHT, p).await?;
                        drive(&mut writer, NOS_LEFT, 0.0).await?;
                    }
                    KeyCode::Char('d') if pressed => {
                        drive(&mut writer, NOS_LEFT, p).await?;
                        drive(&mut writer, NOS_RIGHT, 0.0).await?;
                    }

                    // Pivot in place
                    KeyCode::Char('z') if pressed => {
                        drive(&mut writer, NOS_LEFT, -p).await?;
                        drive(&mut writer, NOS_RIGHT, p).await?;
                    }
                    KeyCode::Char('x') if pressed => {
                        drive(&mut writer, NOS_LEFT, p).await?;
                        drive(&mut writer, NOS_RIGHT, -p).await?;
                    }

                    KeyCode::Char(' ') if pressed => {
                        send(&mut writer, &format!("SET motorStop {NOS_DRIVE}")).await?;
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(SPEEDS.len() - 1);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => {
                        send(&mut writer, "SET end").await?;
                        break;
                    }

                    _ => {}
                }
            }
        }

        // Low-rate sensor poll so the readings scroll by
        if last_poll.elapsed() > SENSOR_POLL {
            send(&mut writer, "GET inputReadSI 4 0").await?; // ultrasonic
            send(&mut writer, "GET inputReadSI 3 0").await?; // floor color
            last_poll = Instant::now();
        }
    }

    Ok(())
}

async fn drive(
    writer: &mut OwnedWriteHalf,
    nos: u8,
    power: f64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    send(writer, &format!("SET motorPower {nos} {power}")).await?;
    send(writer, &format!("SET motorStart {nos}")).await
}

async fn send(
    writer: &mut OwnedWriteHalf,
    line: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    writer.write_all(format!("{line}\n").as_bytes()).await?;
    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    print!("Speed: {label} ({}%)\r\n", SPEEDS[idx]);
}
