//! Client configuration from environment variables

use std::env;
use std::time::Duration;

/// Settings for the backend process, the query pipeline and the eval service.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend executable; also the process name killed on startup
    pub executable: String,

    pub host: String,
    pub port: u16,

    /// Connect attempts after spawning the backend
    pub connect_attempts: u32,
    pub connect_delay: Duration,

    /// Capacity of the query LRU cache
    pub query_cache_size: usize,

    /// Whether queries fetch engine evaluations
    pub query_eval: bool,

    pub chessdb_url: String,
    pub chessdb_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            executable: "chess_pos_db".to_string(),
            host: "127.0.0.1".to_string(),
            port: 1234,
            connect_attempts: 3,
            connect_delay: Duration::from_millis(1000),
            query_cache_size: 128,
            query_eval: true,
            chessdb_url: "https://www.chessdb.cn/cdb.php".to_string(),
            chessdb_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let executable = env::var("POSDB_EXECUTABLE").unwrap_or(defaults.executable);
        let host = env::var("POSDB_HOST").unwrap_or(defaults.host);

        let port = parsed("POSDB_PORT").unwrap_or(defaults.port);

        let connect_attempts = parsed("POSDB_CONNECT_ATTEMPTS")
            .filter(|n: &u32| *n > 0)
            .unwrap_or(defaults.connect_attempts);

        let connect_delay = parsed("POSDB_CONNECT_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.connect_delay);

        let query_cache_size = parsed("POSDB_QUERY_CACHE_SIZE")
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.query_cache_size);

        let query_eval = parsed("POSDB_QUERY_EVAL").unwrap_or(defaults.query_eval);

        let chessdb_url = env::var("CHESSDB_URL").unwrap_or(defaults.chessdb_url);

        let chessdb_timeout = parsed("CHESSDB_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.chessdb_timeout);

        Self {
            executable,
            host,
            port,
            connect_attempts,
            connect_delay,
            query_cache_size,
            query_eval,
            chessdb_url,
            chessdb_timeout,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
