//! Adsight Chat crate - the chat turn pipeline.
//!
//! A turn ensures the conversation exists, loads a bounded history window,
//! turns the question into warehouse SQL (or recognizes it as out of
//! domain), executes the query, streams a grounded answer to the caller and
//! persists the exchange. [`TurnDispatcher`] runs turns on a bounded pool
//! with a per-turn deadline.

pub mod dispatch;
pub mod error;
pub mod executor;
pub mod generator;
pub mod history;
pub mod orchestrator;
pub mod prompt;
pub mod sink;
pub mod state;
pub mod streamer;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatch::TurnDispatcher;
pub use error::ChatError;
pub use executor::QueryExecutor;
pub use generator::{SqlGenerator, SqlOutcome};
pub use orchestrator::{TurnOptions, TurnOrchestrator};
pub use sink::{ChannelSink, ChatEvent, EventSink, SinkClosed};
pub use state::{TurnState, TurnTracker};
pub use streamer::AnswerStreamer;
