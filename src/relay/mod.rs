//! Stream relay: composes, forwards, and re-frames one chat turn.
//!
//! Implementation is split into submodules under `src/relay/`.

pub mod builder;
pub mod core;
pub mod fallback;

pub use builder::StreamRelayBuilder;
pub use self::core::StreamRelay;
pub use fallback::answer_from_completion;
