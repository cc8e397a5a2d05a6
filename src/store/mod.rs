pub mod error;
pub mod kv;
pub mod models;
pub mod profile;

pub use kv::FileStore;
