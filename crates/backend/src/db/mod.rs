mod avatars;
mod connection;
mod schema;

pub use avatars::{CacheRecord, DedupCache};
pub use connection::DbError;
