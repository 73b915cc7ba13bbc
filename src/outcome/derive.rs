//! Game outcome derivation
//!
//! Each game is rebuilt from its moves ordered by `move_number`. Player 1 makes
//! move 1 and player 2 makes move 2; turns alternate, so the parity of the move
//! count says who made the last move. On a win that player is the winner.
//!
//! The parity rule is only as good as the alternation in the data. With
//! `strict_alternation` off (the default) a game where someone moves twice in
//! a row gets a wrong `last_mover`. Turning it on rejects such games instead.

use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::OutcomeConfig;
use crate::error::PipelineError;
use crate::models::{GameFact, GameResult, MoveRecord, DEFAULT_BOARD_CELLS, NO_PLAYER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeriveOptions {
    pub board_cells: u32,
    pub strict_alternation: bool,
}

impl Default for DeriveOptions {
    fn default() -> Self {
        Self {
            board_cells: DEFAULT_BOARD_CELLS,
            strict_alternation: false,
        }
    }
}

impl From<&OutcomeConfig> for DeriveOptions {
    fn from(config: &OutcomeConfig) -> Self {
        Self {
            board_cells: config.board_cells,
            strict_alternation: config.strict_alternation,
        }
    }
}

/// Facts for every well-formed game plus one error per rejected game.
/// Both lists are ordered by `game_id`.
#[derive(Debug, Default)]
pub struct Derivation {
    pub facts: Vec<GameFact>,
    pub failures: Vec<PipelineError>,
}

impl Derivation {
    /// Draws that did not fill the board (kept, but flagged)
    pub fn inconsistent_draws(&self) -> impl Iterator<Item = &GameFact> {
        self.facts.iter().filter(|f| f.is_inconsistent_draw())
    }
}

/// Derive one fact per game. Games are independent: a malformed game is
/// reported in `failures` and does not affect the others.
pub fn derive(moves: &[MoveRecord], opts: &DeriveOptions) -> Derivation {
    let mut games: BTreeMap<&str, Vec<&MoveRecord>> = BTreeMap::new();
    for m in moves {
        games.entry(m.game_id.as_str()).or_default().push(m);
    }
    let games: Vec<(&str, Vec<&MoveRecord>)> = games.into_iter().collect();

    let results: Vec<Result<GameFact, PipelineError>> = games
        .into_par_iter()
        .map(|(game_id, mut game_moves)| derive_game(game_id, &mut game_moves, opts))
        .collect();

    let mut derivation = Derivation::default();
    for result in results {
        match result {
            Ok(fact) => derivation.facts.push(fact),
            Err(e) => {
                warn!(error = %e, "Skipping game");
                derivation.failures.push(e);
            }
        }
    }
    derivation
}

/// Derive the fact for a single game. `moves` is sorted in place.
pub fn derive_game(
    game_id: &str,
    moves: &mut [&MoveRecord],
    opts: &DeriveOptions,
) -> Result<GameFact, PipelineError> {
    moves.sort_by_key(|m| m.move_number);

    if moves.len() < 2 {
        return Err(PipelineError::malformed_game(
            game_id,
            format!("expected at least 2 moves, found {}", moves.len()),
        ));
    }

    for (i, m) in moves.iter().enumerate() {
        let expected = i as u32 + 1;
        if m.move_number != expected {
            return Err(PipelineError::malformed_game(
                game_id,
                format!(
                    "move numbers not contiguous: expected {}, found {}",
                    expected, m.move_number
                ),
            ));
        }
    }

    let mut terminal = moves.iter().filter_map(|m| m.result);
    let game_result = match (terminal.next(), terminal.next()) {
        (Some(result), None) => result,
        (None, _) => {
            return Err(PipelineError::malformed_game(game_id, "no terminal move"));
        }
        (Some(_), Some(_)) => {
            let count = moves.iter().filter(|m| m.result.is_some()).count();
            return Err(PipelineError::malformed_game(
                game_id,
                format!("{} terminal moves", count),
            ));
        }
    };

    let player_1 = moves[0].player_id;
    let player_2 = moves[1].player_id;

    if opts.strict_alternation {
        check_alternation(game_id, moves, player_1, player_2)?;
    }

    let number_of_moves = moves.len() as u32;
    let last_mover: u8 = if number_of_moves % 2 == 1 { 1 } else { 2 };

    let (player_id_win, player_id_lose, is_draw) = match game_result {
        GameResult::Draw => {
            let full_board = number_of_moves == opts.board_cells;
            if !full_board {
                warn!(
                    game_id,
                    number_of_moves,
                    board_cells = opts.board_cells,
                    "Draw recorded without a full board; flagging is_draw = false"
                );
            }
            (NO_PLAYER, NO_PLAYER, full_board)
        }
        GameResult::Win if last_mover == 1 => (player_1, player_2, false),
        GameResult::Win => (player_2, player_1, false),
    };

    debug!(game_id, number_of_moves, %game_result, "game derived");

    Ok(GameFact {
        game_id: game_id.to_string(),
        player_1,
        player_2,
        moves: moves.iter().map(|m| m.column).collect(),
        game_result,
        number_of_moves,
        first_move_column: moves[0].column,
        last_mover,
        player_id_win,
        player_id_lose,
        is_draw,
    })
}

/// Odd moves by player 1, even moves by player 2, and two distinct players.
fn check_alternation(
    game_id: &str,
    moves: &[&MoveRecord],
    player_1: i64,
    player_2: i64,
) -> Result<(), PipelineError> {
    if player_1 == player_2 {
        return Err(PipelineError::malformed_game(
            game_id,
            format!("player {} made both moves 1 and 2", player_1),
        ));
    }
    for m in moves {
        let expected = if m.move_number % 2 == 1 { player_1 } else { player_2 };
        if m.player_id != expected {
            return Err(PipelineError::malformed_game(
                game_id,
                format!(
                    "turn order broken at move {}: expected player {}, found {}",
                    m.move_number, expected, m.player_id
                ),
            ));
        }
    }
    Ok(())
}
