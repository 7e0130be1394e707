//! Turns typed lines into client messages

use shared::{snap_to_grid, ClientMessage, MAP_SIZE};

pub const USAGE: &str = "commands: /move X Y, /build X Y COLOR, /remove X Y, /name NAME; anything else is chat";

/// Parses one input line.
///
/// Moves are kept inside the map. Build and remove coordinates must lie
/// on the map and are snapped onto the block grid. Returns the usage text
/// when a command is malformed.
pub fn parse_command(line: &str) -> Result<Option<ClientMessage>, &'static str> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(ClientMessage::Message {
            message: line.to_string(),
        }));
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    let message = match (command, args.as_slice()) {
        ("/move", [x, y]) => ClientMessage::Move {
            x: number(x)?.clamp(0.0, MAP_SIZE as f64),
            y: number(y)?.clamp(0.0, MAP_SIZE as f64),
        },
        ("/build", [x, y, color]) => ClientMessage::Build {
            x: cell(x)?,
            y: cell(y)?,
            color: color.to_string(),
        },
        ("/remove", [x, y]) => ClientMessage::Remove {
            x: cell(x)?,
            y: cell(y)?,
        },
        ("/name", [name]) => ClientMessage::SetName {
            name: name.to_string(),
        },
        _ => return Err(USAGE),
    };
    Ok(Some(message))
}

fn number(raw: &str) -> Result<f64, &'static str> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or(USAGE)
}

/// A grid cell on the map
fn cell(raw: &str) -> Result<i32, &'static str> {
    let value = number(raw)?;
    if !(0.0..=MAP_SIZE as f64).contains(&value) {
        return Err(USAGE);
    }
    Ok(snap_to_grid(value))
}
