//! Append-only sinks for a finished dataset.

pub mod flat_file;
pub mod sqlite;

pub use sqlite::RentalStore;
