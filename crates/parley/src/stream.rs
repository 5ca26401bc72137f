//! Streaming pipeline: the incremental frame decoder and the consumer that
//! turns a raw response body into a lazy sequence of text increments.
pub mod consumer;
pub mod decoder;
