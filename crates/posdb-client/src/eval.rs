//! Per-move engine evaluations from the chessdb.cn cloud database.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use posdb_core::position;
use posdb_core::Score;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Source of evaluations for every move of a position, keyed by canonical SAN.
pub trait EvalProvider: Send + Sync {
    fn evaluate<'a>(&'a self, fen: &'a str)
        -> BoxFuture<'a, Result<HashMap<String, Score>, ClientError>>;
}

/// Provider that never knows anything.
pub struct NoEval;

impl EvalProvider for NoEval {
    fn evaluate<'a>(
        &'a self,
        _fen: &'a str,
    ) -> BoxFuture<'a, Result<HashMap<String, Score>, ClientError>> {
        Box::pin(async { Ok(HashMap::new()) })
    }
}

/// The provider `config` asks for: chessdb.cn when evaluations are enabled.
pub fn provider_for(config: &ClientConfig) -> Result<Arc<dyn EvalProvider>, ClientError> {
    if config.query_eval {
        Ok(Arc::new(ChessDbClient::new(
            &config.chessdb_url,
            config.chessdb_timeout,
        )?))
    } else {
        Ok(Arc::new(NoEval))
    }
}

#[derive(Debug, Deserialize)]
struct QueryAllResponse {
    status: String,
    #[serde(default)]
    moves: Vec<QueryAllMove>,
}

#[derive(Debug, Deserialize)]
struct QueryAllMove {
    #[serde(default)]
    uci: Option<String>,
    #[serde(default)]
    san: Option<String>,
    #[serde(default)]
    score: Option<serde_json::Value>,
    #[serde(default)]
    winrate: Option<String>,
}

pub struct ChessDbClient {
    client: Client,
    url: String,
}

impl ChessDbClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent("posdb-explorer/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Eval(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn query_all(&self, fen: &str) -> Result<HashMap<String, Score>, ClientError> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[("action", "queryall"), ("board", fen), ("json", "1")])
            .send()
            .await
            .map_err(|e| ClientError::Eval(format!("Request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(ClientError::Eval(format!("HTTP {}", resp.status())));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| ClientError::Eval(format!("Body read error: {e}")))?;

        parse_query_all(fen, &text)
    }
}

impl EvalProvider for ChessDbClient {
    fn evaluate<'a>(
        &'a self,
        fen: &'a str,
    ) -> BoxFuture<'a, Result<HashMap<String, Score>, ClientError>> {
        Box::pin(self.query_all(fen))
    }
}

/// Decode a `queryall` body. Positions the service does not know yield an
/// empty map; moves that are not legal in `fen` are skipped.
fn parse_query_all(fen: &str, body: &str) -> Result<HashMap<String, Score>, ClientError> {
    let response: QueryAllResponse = serde_json::from_str(body)
        .map_err(|e| ClientError::Eval(format!("Malformed response: {e}")))?;

    if response.status != "ok" {
        debug!(status = %response.status, fen, "No evaluation available");
        return Ok(HashMap::new());
    }

    let mut scores = HashMap::new();
    for mv in response.moves {
        let san = mv
            .san
            .as_deref()
            .and_then(|san| position::normalize_san(fen, san).ok())
            .or_else(|| {
                mv.uci
                    .as_deref()
                    .and_then(|uci| position::uci_to_san(fen, uci).ok())
            });
        let Some(san) = san else {
            continue;
        };

        let value = match &mv.score {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        scores.insert(san, Score::parse(value.as_deref(), mv.winrate.as_deref()));
    }
    Ok(scores)
}
