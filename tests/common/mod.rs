#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use posdb_client::framing;
use posdb_client::proxy::DatabaseProxy;
use posdb_core::position;

/// What the fake backend sends back for one request.
pub enum Reply {
    Json(Value),
    /// Bytes written verbatim, header included.
    Raw(Vec<u8>),
}

pub fn json(value: Value) -> Reply {
    Reply::Json(value)
}

/// In-process stand-in for the database backend, serving one connection.
pub struct FakeBackend {
    pub address: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl FakeBackend {
    /// Every request received so far.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Names of the commands received so far.
    pub fn commands(&self) -> Vec<String> {
        self.received()
            .iter()
            .map(|r| r["command"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    pub async fn connect(&self) -> DatabaseProxy {
        DatabaseProxy::connect(&self.address, 3, Duration::from_millis(50))
            .await
            .unwrap()
    }
}

/// Start a backend answering each request with `handler(request)`.
pub async fn spawn_backend<F>(handler: F) -> FakeBackend
where
    F: Fn(&Value) -> Vec<Reply> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        while let Ok(payload) = framing::read_frame(&mut socket).await {
            let request: Value = serde_json::from_str(&payload).unwrap();
            log.lock().unwrap().push(request.clone());

            for reply in handler(&request) {
                let written = match reply {
                    Reply::Json(value) => {
                        framing::write_frame(&mut socket, &value.to_string()).await
                    }
                    Reply::Raw(bytes) => socket.write_all(&bytes).await,
                };
                if written.is_err() {
                    return;
                }
            }
            if request["command"] == "exit" {
                return;
            }
        }
    });

    FakeBackend { address, received }
}

/// Backend with sensible answers to every command.
pub fn default_handler(request: &Value) -> Vec<Reply> {
    match request["command"].as_str().unwrap_or_default() {
        "support" => vec![json(json!({
            "support_manifests": {
                "db_alpha": {"supported_file_types": [".pgn"]},
                "db_beta": {"supported_file_types": [".pgn", ".bcgn"]}
            }
        }))],
        "stats" => vec![json(json!({
            "human": {"num_games": 100, "num_positions": 8000},
            "engine": {"num_games": 50, "num_positions": 6000},
            "server": {"num_games": 10, "num_positions": 1000}
        }))],
        "open" => vec![
            json(json!({"operation": "open", "finished": false})),
            json(json!({"operation": "open", "finished": true})),
        ],
        "close" => vec![json(json!({}))],
        "query" => {
            let requested = &request["query"]["positions"][0];
            let fen = requested["fen"].as_str().unwrap_or_default();
            let fen = match requested["move"].as_str() {
                Some(san) => position::play_san(fen, san).unwrap(),
                None => fen.to_string(),
            };
            vec![json(query_response(&fen))]
        }
        _ => vec![],
    }
}

/// Response where every legal move of `fen` was played by humans and engines,
/// and no game ended in `fen` itself.
pub fn query_response(fen: &str) -> Value {
    let mut children = serde_json::Map::new();
    let mut root_human_wins = 0u64;
    let mut root_engine_draws = 0u64;

    for (i, san) in position::legal_sans(fen).unwrap().into_iter().enumerate() {
        let human_wins = i as u64 + 1;
        let engine_draws = (i as u64 % 3) * 2;
        root_human_wins += human_wins;
        root_engine_draws += engine_draws;
        children.insert(
            san,
            json!({
                "human": {"win": {"count": human_wins, "elo_diff": 10 * human_wins as i64}},
                "engine": {"draw": {"count": engine_draws}}
            }),
        );
    }

    let mut continuations = children;
    continuations.insert(
        "--".to_string(),
        json!({
            "human": {"win": {"count": root_human_wins}},
            "engine": {"draw": {"count": root_engine_draws}}
        }),
    );

    json!({
        "results": [{
            "position": {"fen": fen},
            "continuations": continuations,
            "transpositions": {"--": {}}
        }]
    })
}
