/// Identifier of a controller entity, as stored in the relational catalog.
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Port the coordinator listens on unless `PORT` says otherwise. Workers
/// send their completion callbacks here by default.
pub const DEFAULT_COORDINATOR_PORT: u16 = 8000;
