//! Position-database statistics model.
//!
//! Decodes the `query` response of the database backend into segregated
//! entries, aggregates them per move and derives the figures the explorer
//! displays (performance, Elo error, evaluation, goodness).

pub mod aggregate;
pub mod elo;
pub mod entry;
pub mod game_header;
pub mod goodness;
pub mod origin;
pub mod position;
pub mod response;
pub mod score;
pub mod table;

pub use aggregate::AggregatedEntry;
pub use entry::{Entry, SegregatedEntries};
pub use game_header::GameHeader;
pub use origin::{GameLevel, GameResult, Origin, Select};
pub use position::{PositionError, NULL_MOVE, STARTING_FEN};
pub use response::{QueryCacheEntry, QueryResponse};
pub use score::Score;
