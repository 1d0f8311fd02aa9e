//! Source connectors

mod http;
mod interval;

pub use self::http::HttpSource;
pub use self::interval::IntervalSource;
