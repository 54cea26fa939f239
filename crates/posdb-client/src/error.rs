//! Client error types

use thiserror::Error;

/// Malformed traffic on the backend channel. The connection cannot resync.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Length doesn't match length xor ({length} vs {checksum})")]
    Checksum { length: u32, checksum: u32 },

    #[error("Message too long: {0} bytes")]
    TooLong(u32),

    #[error("Message of {0} bytes exceeds the frame limit")]
    Oversized(usize),

    #[error("Connection closed mid-frame: {0}")]
    ShortRead(#[source] std::io::Error),

    #[error("Payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Cannot establish communication with the database: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Database error: {0}")]
    Backend(String),

    #[error("Connection is unusable after an interrupted or malformed exchange")]
    Unusable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid position: {0}")]
    Position(#[from] posdb_core::PositionError),

    #[error("Evaluation service error: {0}")]
    Eval(String),
}

/// Failure delivered to query waiters. Cloneable so every waiter of a
/// deduplicated request gets its own copy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Cannot establish communication with the database: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Database error: {0}")]
    Backend(String),

    #[error("Queue was reset before the query completed")]
    Reset,

    #[error("Query worker has stopped")]
    Stopped,
}

impl From<ClientError> for QueryError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Connection(msg) => QueryError::Connection(msg),
            ClientError::Backend(msg) | ClientError::Eval(msg) => QueryError::Backend(msg),
            ClientError::Position(e) => QueryError::Backend(e.to_string()),
            other @ (ClientError::Protocol(_) | ClientError::Unusable | ClientError::Io(_)) => {
                QueryError::Protocol(other.to_string())
            }
        }
    }
}
