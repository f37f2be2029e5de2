use std::time::Duration;

/// A page could not be retrieved or rendered. Fatal for one (season, matchday).
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("http {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("webdriver {step} failed for {url}: {reason}")]
    WebDriver {
        url: String,
        step: &'static str,
        reason: String,
    },

    #[error("page {url} not ready after {waited:?}")]
    NotReady { url: String, waited: Duration },
}

/// The backing store rejected a read or write.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unknown key field `{field}` for collection `{collection}`")]
    UnknownKeyField {
        collection: &'static str,
        field: String,
    },

    #[error("key fields {given:?} do not match the unique key {expected:?} of `{collection}`")]
    KeyMismatch {
        collection: &'static str,
        expected: &'static [&'static str],
        given: Vec<String>,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("no seasons configured")]
    NoSeasons,

    #[error("matchday range {start}-{end} outside 1..={season_length}")]
    MatchdayRange {
        start: u32,
        end: u32,
        season_length: u32,
    },

    #[error("bad css selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("read layout file {path}: {reason}")]
    Layout { path: String, reason: String },
}
