//! Upstream provider adapters.

mod yahoo;

pub use yahoo::YahooAdapter;
