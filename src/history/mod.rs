//! Bounded per-deployment metric history

pub mod ring;

pub use ring::{MetricDataPoint, RingBuffer, DEFAULT_HISTORY_CAPACITY};
