pub mod id;
pub mod stream;

pub use id::PrefixedId;
