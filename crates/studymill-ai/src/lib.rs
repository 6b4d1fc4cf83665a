mod client;
mod error;
mod loader;
mod parse;
mod pipeline;
mod prompts;
mod splitter;

pub use client::{ChatClient, ChatConfig, ChatMessage};
pub use error::{AiError, Result};
pub use loader::load_document;
pub use parse::parse_quiz;
pub use pipeline::Pipeline;
pub use prompts::QUIZ_QUESTION_COUNT;
pub use splitter::TextSplitter;
