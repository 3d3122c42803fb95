pub mod comments;
pub mod config;
pub mod featured;
pub mod leaderboard;
pub mod llm;
pub mod store;
pub mod summary;
pub mod sync;
pub mod youtube;
