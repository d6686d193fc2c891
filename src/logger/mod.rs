//! Structured JSONL trace log of mock activity with graceful degradation.

pub mod jsonl;
