//! Reader for the move-level games dataset
//!
//! `game_id,player_id,move_number,column,result` with a header row. `result`
//! is empty on every move except the last one of a game.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;

use crate::models::{GameResult, MoveRecord};

const FIELD_COUNT: usize = 5;

pub fn read_moves_csv(path: impl AsRef<Path>) -> Result<Vec<MoveRecord>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read moves dataset {:?}", path))?;
    parse_moves_csv(&contents).with_context(|| format!("Failed to parse {:?}", path))
}

/// Parse CSV text. The first line is always treated as the header.
pub fn parse_moves_csv(input: &str) -> Result<Vec<MoveRecord>> {
    let mut moves = Vec::new();
    for (idx, line) in input.lines().enumerate().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_line(line).with_context(|| format!("line {}", idx + 1))?;
        moves.push(record);
    }
    Ok(moves)
}

fn parse_line(line: &str) -> Result<MoveRecord> {
    let fields: Vec<&str> = line.split(',').map(unquote).collect();
    if fields.len() != FIELD_COUNT {
        bail!("expected {} fields, found {}", FIELD_COUNT, fields.len());
    }

    let game_id = fields[0];
    if game_id.is_empty() {
        bail!("empty game_id");
    }
    let player_id = fields[1]
        .parse::<i64>()
        .map_err(|e| anyhow!("bad player_id {:?}: {}", fields[1], e))?;
    let move_number = fields[2]
        .parse::<u32>()
        .map_err(|e| anyhow!("bad move_number {:?}: {}", fields[2], e))?;
    if move_number == 0 {
        bail!("move_number is 1-based, found 0");
    }
    let column = fields[3]
        .parse::<i64>()
        .map_err(|e| anyhow!("bad column {:?}: {}", fields[3], e))?;
    let result = match fields[4] {
        "" | "null" | "NULL" => None,
        raw => Some(GameResult::parse(raw).ok_or_else(|| anyhow!("unknown result {:?}", raw))?),
    };

    Ok(MoveRecord::new(game_id, player_id, move_number, column, result))
}

fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}
