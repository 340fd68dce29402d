//! Topic error types

use thiserror::Error;

/// Error type for topic operations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TopicError {
    /// All receivers are gone
    #[error("channel closed")]
    ChannelClosed,

    /// Topic exists with different type
    #[error("topic '{0}' already exists with different type")]
    TypeMismatch(String),

    /// The single consumer of the topic was already handed out
    #[error("topic '{0}' already has a subscriber")]
    AlreadySubscribed(String),
}
