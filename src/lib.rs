pub mod artifacts;
pub mod assemble;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod fetch;
pub mod ingest;
pub mod matches;
pub mod model;
pub mod page;
pub mod standings;
pub mod store;
pub mod temporal;
pub mod webdriver;

pub use config::PipelineConfig;
pub use error::{ConfigError, RetrievalError, StorageError};
pub use fetch::{Fetcher, HttpFetcher, StaticFetcher};
pub use ingest::{IngestSummary, MatchdayParser, MatchdayRecords, Orchestrator};
pub use model::{MatchRecord, SENTINEL, StandingsRow};
pub use store::MergeStore;
pub use temporal::{Clock, FixedClock, SystemClock};
pub use webdriver::WebDriverFetcher;
