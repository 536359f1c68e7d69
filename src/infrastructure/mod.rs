//! Adapters for the domain ports: a simulated billing provider and a
//! channel-backed event sink.

pub mod channel_sink;
pub mod in_memory;
