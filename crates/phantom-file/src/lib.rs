//! phantom-file - Durable token storage on the local filesystem.

mod store;

pub use store::FileTokenStore;
