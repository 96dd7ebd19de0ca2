//! Ballu: a Telegram webhook bot that maps free text onto a handful of web-API
//! capabilities (weather, stocks, news, images, places, memes) and chats otherwise.

pub mod chatbot;
pub mod config;
pub mod extractor;
pub mod greeting;
pub mod intent;
pub mod llm;
pub mod server;
pub mod telegram_log;
