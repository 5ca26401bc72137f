//! Core of the parley chat system: the incremental frame decoder and
//! stream consumer for line-delimited completion streams, the upstream
//! provider clients, the per-turn classifier, and the conversation
//! orchestrator. The relay server and terminal client build on this crate.
pub mod classifier;
pub mod errors;
pub mod image;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod store;
pub mod stream;
