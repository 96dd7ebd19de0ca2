//! Chatbot module - turns Telegram messages into capability calls and replies.

pub mod capabilities;
pub mod dispatcher;
pub mod engine;
pub mod format;
pub mod message;
pub mod prompts;
pub mod registry;
pub mod store;
pub mod telegram;
pub mod whisper;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use engine::{BotEngine, Outcome};
pub use registry::Registry;
pub use store::{Database, NullStore, Store};
pub use telegram::TelegramClient;
pub use whisper::Whisper;
