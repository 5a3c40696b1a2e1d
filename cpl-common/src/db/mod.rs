//! SQLite persistence

pub mod init;
pub mod repository;
pub mod settings;

pub use init::{init_database, init_memory_database, init_schema};
pub use repository::SqliteRepository;
