// Maze layout loading
//
// A layout is a plain-text table, parsed once at startup:
//
//   # comment
//   width height cell_size
//   row col n s e w
//   ...
//
// with one line per cell and one code per side (north, south, east,
// west): 0 unknown, 1 open, 2 wall, 3 stop strip, 4 pickup zone,
// 5 dropoff zone. Codes are applied through the maze mutators, so edge
// mirroring holds by construction; omitted cells stay unknown.

use std::path::Path;

use super::{Maze, Side, StopState, WallState, ZoneState};

/// Errors from reading or parsing a maze layout file
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Load a maze layout from a file
pub fn load_layout(path: &Path) -> Result<Maze, LayoutError> {
    let text = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_layout(&text)
}

/// Parse a maze layout from text
pub fn parse_layout(text: &str) -> Result<Maze, LayoutError> {
    let mut maze: Option<Maze> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();

        match maze {
            None => {
                // Header: width height cell_size
                if fields.len() != 3 {
                    return Err(parse_err(line_no, "expected header: width height cell_size"));
                }
                let width = parse_field::<usize>(line_no, fields[0], "width")?;
                let height = parse_field::<usize>(line_no, fields[1], "height")?;
                let cell_size = parse_field::<f64>(line_no, fields[2], "cell_size")?;
                if width == 0 || height == 0 || cell_size <= 0.0 {
                    return Err(parse_err(line_no, "maze dimensions must be positive"));
                }
                maze = Some(Maze::new(width, height, cell_size));
            }
            Some(ref mut m) => {
                // Cell line: row col n s e w
                if fields.len() != 6 {
                    return Err(parse_err(line_no, "expected cell line: row col n s e w"));
                }
                let row = parse_field::<usize>(line_no, fields[0], "row")?;
                let col = parse_field::<usize>(line_no, fields[1], "col")?;
                if row < 1 || row > m.height() || col < 1 || col > m.width() {
                    return Err(parse_err(
                        line_no,
                        &format!("cell ({col},{row}) outside {}x{} maze", m.width(), m.height()),
                    ));
                }
                let sides = [Side::North, Side::South, Side::East, Side::West];
                for (field, side) in fields[2..].iter().zip(sides) {
                    let code = parse_field::<u8>(line_no, field, "side code")?;
                    apply_code(m, col, row, side, code)
                        .map_err(|reason| parse_err(line_no, &reason))?;
                }
            }
        }
    }

    maze.ok_or_else(|| parse_err(0, "empty layout"))
}

fn apply_code(m: &mut Maze, col: usize, row: usize, side: Side, code: u8) -> Result<(), String> {
    match code {
        0 => {} // unknown, leave untouched
        1 => {
            m.set_wall(col, row, side, WallState::Absent);
            m.set_stop(col, row, side, StopState::Normal);
            m.set_zone(col, row, side, ZoneState::Normal);
        }
        2 => m.set_wall(col, row, side, WallState::Present),
        3 => m.set_stop(col, row, side, StopState::Stop),
        4 => m.set_zone(col, row, side, ZoneState::Pickup),
        5 => m.set_zone(col, row, side, ZoneState::Dropoff),
        other => return Err(format!("unknown side code {other}")),
    }
    Ok(())
}

fn parse_err(line: usize, reason: &str) -> LayoutError {
    LayoutError::Parse {
        line,
        reason: reason.to_string(),
    }
}

fn parse_field<T: std::str::FromStr>(
    line: usize,
    field: &str,
    name: &str,
) -> Result<T, LayoutError> {
    field
        .parse()
        .map_err(|_| parse_err(line, &format!("invalid {name} '{field}'")))
}
