/// All timestamps exchanged on the wire are unix seconds.
pub type UnixSeconds = i64;

/// All store-side timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
