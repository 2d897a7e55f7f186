//! Sadiq CLI library: index building and the interactive chatbot.

pub mod chatbot;
pub mod index;

pub use chatbot::{ChatBot, ChatBotConfig};
pub use index::{build_index, open_index};
