pub mod codec;
pub mod error;
pub mod message;
pub mod protocol;
pub mod qos;
pub mod return_code;
pub mod topic;

/// A specialized `Result` type for tern codec operations
///
/// This is defined as a convenience
pub type Result<T> = std::result::Result<T, crate::error::Error>;
