//! Target connectors

mod echo;
mod http;
mod log;

pub use self::echo::EchoTarget;
pub use self::http::HttpTarget;
pub use self::log::LogTarget;
