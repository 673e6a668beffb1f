//! Serialization of chunk records

pub mod jsonl;

pub use jsonl::{preview, read_jsonl, write_jsonl};
