//! Collects every row of a virtualized (lazily rendered) browser table exactly
//! once, in the order scrolling reveals them.

pub mod config;
pub mod models;
pub mod scrapers;
pub mod sink;

pub use models::{RenderedRow, RowKey, RowRecord};
pub use scrapers::{RowCollector, StopReason};
