//! Typed messages of the backend's JSON command protocol.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use posdb_core::origin::{GameLevel, GameResult};
use posdb_core::response::QueryPosition;
use posdb_core::NULL_MOVE;

use crate::error::{ClientError, ProtocolError};

/// Token echoed by the backend; the channel is half duplex so one is enough.
pub const QUERY_TOKEN: &str = "toktok";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Support,
    Stats,
    Open { database_path: PathBuf },
    Close,
    Query { query: QueryRequest },
    Dump(DumpRequest),
    Create(CreateRequest),
    Exit,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Support => "support",
            Request::Stats => "stats",
            Request::Open { .. } => "open",
            Request::Close => "close",
            Request::Query { .. } => "query",
            Request::Dump(_) => "dump",
            Request::Create(_) => "create",
            Request::Exit => "exit",
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What to fetch for one select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    pub fetch_children: bool,
    pub fetch_first_game: bool,
    pub fetch_first_game_for_each_child: bool,
    pub fetch_last_game: bool,
    pub fetch_last_game_for_each_child: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            fetch_children: true,
            fetch_first_game: true,
            fetch_first_game_for_each_child: true,
            fetch_last_game: false,
            fetch_last_game_for_each_child: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub token: String,
    pub positions: Vec<QueryPosition>,
    pub levels: Vec<GameLevel>,
    pub results: Vec<GameResult>,
    pub continuations: FetchOptions,
    pub transpositions: FetchOptions,
}

impl QueryRequest {
    /// Query for `fen`, or for the position after `san` when it is a real move.
    pub fn for_position(fen: &str, san: Option<&str>) -> Self {
        let san = san.filter(|s| *s != NULL_MOVE).map(str::to_string);
        Self {
            token: QUERY_TOKEN.to_string(),
            positions: vec![QueryPosition {
                fen: fen.to_string(),
                san,
            }],
            levels: GameLevel::ALL.to_vec(),
            results: GameResult::ALL.to_vec(),
            continuations: FetchOptions::default(),
            transpositions: FetchOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DumpRequest {
    pub output_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_path: Option<PathBuf>,
    pub min_count: u64,
    pub report_progress: bool,
    pub pgns: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRequest {
    pub destination_path: PathBuf,
    pub merge: bool,
    pub report_progress: bool,
    pub human_pgns: Vec<PathBuf>,
    pub engine_pgns: Vec<PathBuf>,
    pub server_pgns: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_paths: Option<Vec<PathBuf>>,
}

/// Intermediate or terminal frame of a streamed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub overall_progress: Option<f64>,
    #[serde(default)]
    pub imported_file_path: Option<String>,
}

impl Progress {
    pub fn is(&self, operation: &str) -> bool {
        self.operation.as_deref() == Some(operation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSupportManifest {
    pub supported_file_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SupportResponse {
    pub support_manifests: BTreeMap<String, DatabaseSupportManifest>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelStats {
    pub num_games: u64,
    pub num_positions: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub human: LevelStats,
    pub engine: LevelStats,
    pub server: LevelStats,
}

impl DatabaseStats {
    pub fn level(&self, level: GameLevel) -> LevelStats {
        match level {
            GameLevel::Human => self.human,
            GameLevel::Engine => self.engine,
            GameLevel::Server => self.server,
        }
    }

    pub fn total_games(&self) -> u64 {
        self.human.num_games + self.engine.num_games + self.server.num_games
    }

    pub fn total_positions(&self) -> u64 {
        self.human.num_positions + self.engine.num_positions + self.server.num_positions
    }

    /// Average game length in full moves, None for an empty database.
    pub fn average_game_length(&self) -> Option<u64> {
        let games = self.total_games();
        if games == 0 {
            return None;
        }
        Some((self.total_positions() as f64 / games as f64 / 2.0).round() as u64)
    }
}

/// State of the backend's database as seen by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseInfo {
    pub path: Option<PathBuf>,
    pub is_open: bool,
    /// Counts, present when a database is open
    pub stats: Option<DatabaseStats>,
}

/// Parse a response payload, surfacing the backend's `error` field first.
pub fn parse_response<T: DeserializeOwned>(payload: &str) -> Result<T, ClientError> {
    let value: serde_json::Value = serde_json::from_str(payload).map_err(ProtocolError::from)?;
    check_error(&value)?;
    Ok(serde_json::from_value(value).map_err(ProtocolError::from)?)
}

/// Backend error carried by the response, if any.
pub fn check_error(value: &serde_json::Value) -> Result<(), ClientError> {
    match value.get("error") {
        None => Ok(()),
        Some(serde_json::Value::String(message)) => Err(ClientError::Backend(message.clone())),
        Some(other) => Err(ClientError::Backend(other.to_string())),
    }
}
