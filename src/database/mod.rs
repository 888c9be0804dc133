// Database module
// SQLite registry of ingested documents plus the LanceDB chunk index

pub mod lancedb;
pub mod sqlite;

pub use sqlite::Database;
pub use sqlite::models::{DocumentRecord, NewDocument};
