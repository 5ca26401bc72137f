//! The objects passed around by the chat core.
//!
//! Two layers overlap here: the rich conversation model the orchestrator
//! owns and persists (messages with ids, timestamps, and image assets), and
//! the flat role/content pairs that go over the wire to the relay or a
//! provider. Conversions between the two live next to the types.
pub mod conversation;
pub mod message;
