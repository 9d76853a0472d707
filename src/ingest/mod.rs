//! Bounded producer/consumer ingest harness (spec §4.6).

pub mod ring;

pub use ring::Ring;
