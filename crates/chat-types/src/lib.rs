pub mod message;
pub mod conversation;
pub mod event;
pub mod wire;
pub mod config;
pub mod error;

#[cfg(test)]
mod tests;

pub use error::ChatError;
pub type Result<T> = std::result::Result<T, ChatError>;
