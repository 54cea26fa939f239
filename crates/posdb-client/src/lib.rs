pub use posdb_core;

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod eval;
pub mod explorer;
pub mod framing;
pub mod protocol;
pub mod proxy;
pub mod scheduler;
