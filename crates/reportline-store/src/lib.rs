//! reportline-store: progress ledger for windowed report fetches
//!
//! Records, per (job, query identity, window), how far a fetch got so an
//! interrupted run resumes where it stopped and finished windows are skipped.
//! A query's identity is the blake3 hash of its canonical JSON form.

pub mod hash;
pub mod ledger;

pub use hash::{hash_bytes, query_identity, short_hash};
pub use ledger::{Ledger, WindowKey, WindowProgress, WindowStatus};
