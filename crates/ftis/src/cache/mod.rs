pub mod fingerprint;
pub mod store;

pub use fingerprint::{fingerprint, Fingerprint};
pub use store::{read_artifact, write_artifact, write_atomic, CacheStore, CACHE_DIR};
