pub mod codec;
pub mod commands;
pub mod config;
pub mod connection;
pub mod frame;
pub mod reply;
pub mod request;
pub mod server;

pub use commands::{CommandTable, Dispatcher};
pub use reply::Reply;
pub use request::Request;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
