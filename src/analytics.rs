//! Downstream metrics over derived game facts
//!
//! - win counts by first-move column, with percent rank
//! - games played per player and per nationality
//! - players with exactly one game, with how that game ended for them
//!
//! Player attributes come from the ingested pages; only `id`, `data.nat` and
//! `data.email` are kept.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::ingest::ndjson::ndjson_lines;
use crate::models::{GameFact, PlayerDim};
use crate::storage::ObjectSource;

#[derive(Debug, Deserialize)]
struct RawPlayer {
    id: i64,
    #[serde(default)]
    data: RawPlayerData,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlayerData {
    #[serde(default)]
    nat: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Parse one stored NDJSON page of player records
pub fn parse_player_page(body: &str) -> Result<Vec<PlayerDim>> {
    ndjson_lines(body)
        .enumerate()
        .map(|(i, line)| {
            let raw: RawPlayer = serde_json::from_str(line)
                .with_context(|| format!("player record on line {}", i + 1))?;
            Ok(PlayerDim {
                player_id: raw.id,
                nationality: raw.data.nat,
                email: raw.data.email,
            })
        })
        .collect()
}

/// Read every stored player page under `prefix`
pub async fn load_players(
    source: &dyn ObjectSource,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<PlayerDim>> {
    let keys = source.list(bucket, prefix).await?;
    let mut players = Vec::new();
    for key in keys {
        let body = source.get(bucket, &key).await?;
        let text = std::str::from_utf8(&body)
            .with_context(|| format!("{} is not UTF-8", key))?;
        let page = parse_player_page(text).with_context(|| format!("Failed to parse {}", key))?;
        debug!(key = %key, players = page.len(), "player page loaded");
        players.extend(page);
    }
    Ok(players)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirstMoveWinRank {
    pub first_move_column: i64,
    pub win_count: u64,
    /// (rank - 1) / (rows - 1) ordered by `win_count`; 0 for a single row
    pub percent_rank: f64,
}

/// Games won by the first player, grouped by the column of the opening move
pub fn first_move_win_rank(facts: &[GameFact]) -> Vec<FirstMoveWinRank> {
    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for fact in facts.iter().filter(|f| f.player_id_win == f.player_1) {
        *counts.entry(fact.first_move_column).or_default() += 1;
    }

    let mut rows: Vec<(i64, u64)> = counts.into_iter().collect();
    rows.sort_by_key(|&(column, wins)| (wins, column));

    let n = rows.len();
    rows.iter()
        .map(|&(column, wins)| {
            let lower = rows.iter().filter(|&&(_, w)| w < wins).count();
            let percent_rank = if n > 1 {
                lower as f64 / (n - 1) as f64
            } else {
                0.0
            };
            FirstMoveWinRank {
                first_move_column: column,
                win_count: wins,
                percent_rank,
            }
        })
        .collect()
}

/// Distinct games per player. A player on both sides of a game counts once.
pub fn games_played(facts: &[GameFact]) -> BTreeMap<i64, u64> {
    let pairs: BTreeSet<(i64, &str)> = facts
        .iter()
        .flat_map(|f| [(f.player_1, f.game_id.as_str()), (f.player_2, f.game_id.as_str())])
        .collect();

    let mut counts = BTreeMap::new();
    for (player_id, _) in pairs {
        *counts.entry(player_id).or_default() += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NationalityGames {
    pub nationality: Option<String>,
    pub games_played: u64,
}

/// Sum of per-player game counts by nationality. Players missing from the
/// player dimension are left out.
pub fn games_by_nationality(
    players: &[PlayerDim],
    played: &BTreeMap<i64, u64>,
) -> Vec<NationalityGames> {
    let mut totals: BTreeMap<Option<String>, u64> = BTreeMap::new();
    for player in players {
        if let Some(games) = played.get(&player.player_id) {
            *totals.entry(player.nationality.clone()).or_default() += games;
        }
    }
    totals
        .into_iter()
        .map(|(nationality, games_played)| NationalityGames {
            nationality,
            games_played,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerGameStatus {
    Drew,
    Won,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleGamePlayer {
    pub player_id: i64,
    /// `None` when the game is a draw that did not fill the board
    pub game_status: Option<PlayerGameStatus>,
    pub email: Option<String>,
    pub nationality: Option<String>,
    pub games_played: u64,
}

/// Players who played exactly one game, for follow-up campaigns
pub fn single_game_players(
    facts: &[GameFact],
    players: &[PlayerDim],
    played: &BTreeMap<i64, u64>,
) -> Vec<SingleGamePlayer> {
    let by_id: HashMap<i64, &PlayerDim> = players.iter().map(|p| (p.player_id, p)).collect();

    let mut out = Vec::new();
    for (&player_id, &games) in played.iter().filter(|(_, games)| **games == 1) {
        let Some(player) = by_id.get(&player_id) else {
            continue;
        };
        let Some(game) = facts.iter().find(|f| f.involves(player_id)) else {
            warn!(player_id, "Player counted with one game but no game found");
            continue;
        };

        let game_status = if game.is_draw {
            Some(PlayerGameStatus::Drew)
        } else if player_id == game.player_id_win {
            Some(PlayerGameStatus::Won)
        } else if player_id == game.player_id_lose {
            Some(PlayerGameStatus::Lost)
        } else {
            None
        };

        out.push(SingleGamePlayer {
            player_id,
            game_status,
            email: player.email.clone(),
            nationality: player.nationality.clone(),
            games_played: games,
        });
    }
    out
}

/// All metrics in one pass, for logging or export
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub games: usize,
    pub inconsistent_draws: usize,
    pub first_move_win_rank: Vec<FirstMoveWinRank>,
    pub games_by_nationality: Vec<NationalityGames>,
    pub single_game_players: Vec<SingleGamePlayer>,
}

impl AnalyticsReport {
    pub fn build(facts: &[GameFact], players: &[PlayerDim]) -> Self {
        let played = games_played(facts);
        Self {
            games: facts.len(),
            inconsistent_draws: facts.iter().filter(|f| f.is_inconsistent_draw()).count(),
            first_move_win_rank: first_move_win_rank(facts),
            games_by_nationality: games_by_nationality(players, &played),
            single_game_players: single_game_players(facts, players, &played),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameResult, NO_PLAYER};
    use crate::storage::{MemoryObjectStore, ObjectSink};
    use bytes::Bytes;

    fn win(id: &str, p1: i64, p2: i64, first: i64, first_player_wins: bool) -> GameFact {
        let (w, l, n, last) = if first_player_wins { (p1, p2, 7, 1) } else { (p2, p1, 8, 2) };
        GameFact {
            game_id: id.into(),
            player_1: p1,
            player_2: p2,
            moves: vec![first; n as usize],
            game_result: GameResult::Win,
            number_of_moves: n,
            first_move_column: first,
            last_mover: last,
            player_id_win: w,
            player_id_lose: l,
            is_draw: false,
        }
    }

    fn draw(id: &str, p1: i64, p2: i64, n: u32) -> GameFact {
        GameFact {
            game_id: id.into(),
            player_1: p1,
            player_2: p2,
            moves: vec![1; n as usize],
            game_result: GameResult::Draw,
            number_of_moves: n,
            first_move_column: 1,
            last_mover: if n % 2 == 1 { 1 } else { 2 },
            player_id_win: NO_PLAYER,
            player_id_lose: NO_PLAYER,
            is_draw: n == 16,
        }
    }

    fn player(id: i64, nat: &str) -> PlayerDim {
        PlayerDim {
            player_id: id,
            nationality: Some(nat.into()),
            email: Some(format!("p{}@example.com", id)),
        }
    }

    #[test]
    fn test_parse_player_page_keeps_analysis_fields() {
        let body = "{\"id\":1,\"data\":{\"nat\":\"US\",\"email\":\"a@b.c\",\"name\":\"x\"}}\n\
                    {\"id\":2}\n";
        let players = parse_player_page(body).unwrap();
        assert_eq!(players[0], player_with(1, Some("US"), Some("a@b.c")));
        assert_eq!(players[1], player_with(2, None, None));
        assert!(parse_player_page("{\"data\":{}}").is_err());
    }

    fn player_with(id: i64, nat: Option<&str>, email: Option<&str>) -> PlayerDim {
        PlayerDim {
            player_id: id,
            nationality: nat.map(String::from),
            email: email.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_load_players_reads_all_pages() {
        let store = MemoryObjectStore::new();
        store
            .put("9dt", "players/0.json", Bytes::from("{\"id\":1}\n{\"id\":2}"))
            .await
            .unwrap();
        store
            .put("9dt", "players/1.json", Bytes::from("{\"id\":3}"))
            .await
            .unwrap();
        store
            .put("9dt", "games_f/games.json", Bytes::from("not players"))
            .await
            .unwrap();

        let players = load_players(&store, "9dt", "players/").await.unwrap();
        let ids: Vec<i64> = players.iter().map(|p| p.player_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_first_move_percent_rank() {
        let facts = vec![
            win("a", 1, 2, 1, true),
            win("b", 1, 2, 1, true),
            win("c", 1, 2, 1, true),
            win("d", 1, 2, 2, true),
            win("e", 1, 2, 3, true),
            win("f", 1, 2, 3, true),
            win("g", 1, 2, 4, false),
        ];
        let ranks = first_move_win_rank(&facts);
        let rows: Vec<(i64, u64, f64)> = ranks
            .iter()
            .map(|r| (r.first_move_column, r.win_count, r.percent_rank))
            .collect();
        assert_eq!(rows, vec![(2, 1, 0.0), (3, 2, 0.5), (1, 3, 1.0)]);
    }

    #[test]
    fn test_percent_rank_ties_and_single_row() {
        let facts = vec![win("a", 1, 2, 1, true), win("b", 1, 2, 2, true)];
        let ranks = first_move_win_rank(&facts);
        assert!(ranks.iter().all(|r| r.percent_rank == 0.0));

        let ranks = first_move_win_rank(&facts[..1]);
        assert_eq!(ranks.len(), 1);
        assert_eq!(ranks[0].percent_rank, 0.0);
    }

    #[test]
    fn test_games_played_counts_distinct_games() {
        let facts = vec![
            win("a", 1, 2, 1, true),
            win("b", 1, 3, 1, false),
            win("c", 4, 4, 1, true),
        ];
        let played = games_played(&facts);
        assert_eq!(played.get(&1), Some(&2));
        assert_eq!(played.get(&2), Some(&1));
        assert_eq!(played.get(&4), Some(&1));

        let total: u64 = played.values().sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_games_by_nationality_joins_players() {
        let facts = vec![win("a", 1, 2, 1, true), win("b", 1, 3, 1, true)];
        let players = vec![player(1, "US"), player(2, "FR"), player(3, "US")];
        let rows = games_by_nationality(&players, &games_played(&facts));
        assert_eq!(
            rows,
            vec![
                NationalityGames { nationality: Some("FR".into()), games_played: 1 },
                NationalityGames { nationality: Some("US".into()), games_played: 3 },
            ]
        );
    }

    #[test]
    fn test_single_game_player_status() {
        let facts = vec![
            win("a", 1, 2, 1, true),
            draw("b", 3, 4, 16),
            draw("c", 5, 6, 9),
            win("d", 1, 7, 1, true),
        ];
        let players: Vec<PlayerDim> = (1..=7).map(|id| player(id, "NZ")).collect();
        let played = games_played(&facts);

        let single = single_game_players(&facts, &players, &played);
        let statuses: Vec<(i64, Option<PlayerGameStatus>)> =
            single.iter().map(|s| (s.player_id, s.game_status)).collect();
        assert_eq!(
            statuses,
            vec![
                (2, Some(PlayerGameStatus::Lost)),
                (3, Some(PlayerGameStatus::Drew)),
                (4, Some(PlayerGameStatus::Drew)),
                (5, None),
                (6, None),
                (7, Some(PlayerGameStatus::Lost)),
            ]
        );
        assert_eq!(single[0].email.as_deref(), Some("p2@example.com"));
    }

    #[test]
    fn test_report_counts_inconsistent_draws() {
        let facts = vec![draw("a", 1, 2, 16), draw("b", 3, 4, 12), win("c", 1, 3, 2, true)];
        let report = AnalyticsReport::build(&facts, &[]);
        assert_eq!(report.games, 3);
        assert_eq!(report.inconsistent_draws, 1);
        assert!(report.single_game_players.is_empty());
    }
}
