// Database module
// Read-only access to the SQLite embedding store produced by the note indexer

pub mod sqlite;

pub use sqlite::*;
