mod cache;
mod key_set;
mod registry;

pub use cache::KeySetCache;
pub use key_set::{KeyFamily, KeySet, SigningKey};
pub use registry::JwksRegistry;
