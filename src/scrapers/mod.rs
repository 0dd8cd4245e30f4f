pub mod browser;
pub mod collector;
pub mod error;
pub mod extract;
pub mod markup;
pub mod traits;
pub mod types;

pub use browser::{ChromeSession, ChromeTableAccessor, GridSelectors};
pub use collector::RowCollector;
pub use error::{AccessError, CollectError};
pub use extract::HeaderExtractor;
pub use markup::CellSelectors;
pub use traits::{PageAccessor, RowExtractor, RowSink};
pub use types::{CollectStats, CollectorConfig, StopReason};
