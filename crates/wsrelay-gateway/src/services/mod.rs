//! Built-in request handlers.

mod chat;
mod list_model;
mod ping;
mod unknown;

pub use chat::ChatHandler;
pub use list_model::ListModelHandler;
pub use ping::PingHandler;
pub use unknown::UnknownActionHandler;
