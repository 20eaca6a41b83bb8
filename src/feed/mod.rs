//! Upstream market data feeds

pub mod types;
pub mod throttle;
pub mod yahoo;

use crate::error::Result;
use async_trait::async_trait;
use types::{FeedFrame, FeedRequest};

pub use throttle::RequestThrottle;
pub use yahoo::YahooFeed;

/// Source of OHLCV rows.
///
/// Empty, partial and malformed responses are all recoverable for callers:
/// implementations return `AppError::Feed` for anything they cannot parse.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Feed ID (e.g., "yahoo")
    fn id(&self) -> &'static str;

    /// Fetch every ticker of the request from `start` up to now
    async fn fetch(&self, request: &FeedRequest) -> Result<FeedFrame>;
}
