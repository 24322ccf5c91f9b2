pub mod analytics;
pub mod anthology;
pub mod auth;
pub mod autosave;
pub mod blob;
pub mod completion;
pub mod config;
pub mod editors;
pub mod error;
pub mod fonts;
pub mod record;
pub mod review;
pub mod session;
pub mod store;
pub mod utils;
pub mod word_count;
