//! Chat domain: message types, the SSE event decoder, and the transcript reducer.
//!
//! - `types`: transcript entries, citations, decoder events
//! - `sse`: byte stream → `ChatEvent` stream
//! - `transcript`: folds events into the ordered message list

pub mod sse;
pub mod transcript;
pub mod types;

pub use sse::{ChatEventStream, decode_stream, parse_payload};
pub use transcript::Transcript;
pub use types::{ChatAnswer, ChatEvent, Message, Role, Source};
