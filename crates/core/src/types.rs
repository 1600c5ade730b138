/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Calendar day used as the partition key.
pub type Day = chrono::NaiveDate;
