#![warn(clippy::unwrap_used)]

pub mod segments;

pub use segments::{SegmentCache, SegmentMap, SegmentReader, SegmentWriter};
