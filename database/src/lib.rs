pub mod access;
pub mod cache;
pub mod db;
pub mod errors;
pub mod staging;
pub mod stores;

pub use access::{CachedDbAccess, CachedDbItem, DbKey};
pub use db::Database;
pub use errors::{DbError, DbResult};
pub use staging::StagingArea;
