/// Database model definitions.
pub mod models;
/// Profile and leaderboard persistence.
pub mod profile_store;
/// Storage abstraction layer for database operations.
pub mod storage;
