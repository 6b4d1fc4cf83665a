use crate::{loader, parse, prompts, ChatClient, ChatMessage, Result, TextSplitter};
use std::path::Path;
use studymill_core::StudyOutput;
use tracing::{debug, info};

/// Hard cap on context size when splitting yields nothing usable
const CONTEXT_FALLBACK_CHARS: usize = 80_000;

/// The study-material pipeline: document in, study guide + quiz out.
///
/// Runs two model calls over the first chunk of the document: one for the
/// summary, one for the quiz.
#[derive(Debug, Clone)]
pub struct Pipeline {
    client: ChatClient,
    splitter: TextSplitter,
}

impl Pipeline {
    pub fn new(client: ChatClient) -> Self {
        Pipeline {
            client,
            splitter: TextSplitter::default(),
        }
    }

    pub fn with_splitter(client: ChatClient, splitter: TextSplitter) -> Self {
        Pipeline { client, splitter }
    }

    /// Process the document at `path` into a summary and quiz.
    pub async fn process(&self, path: &Path) -> Result<StudyOutput> {
        let text = loader::load_document(path)?;
        let context = self.context_window(&text);
        debug!(
            document_chars = text.chars().count(),
            context_chars = context.chars().count(),
            "Loaded document"
        );

        info!("Generating summary");
        let summary = self
            .client
            .chat(&[ChatMessage::user(prompts::summary_prompt(&context))])
            .await?;

        info!("Generating quiz");
        let reply = self
            .client
            .chat(&[ChatMessage::user(prompts::quiz_prompt(&context))])
            .await?;
        let quiz = parse::parse_quiz(&reply)?;

        Ok(StudyOutput { summary, quiz })
    }

    /// First chunk of the document, or a hard-truncated prefix if the
    /// splitter produced nothing.
    fn context_window(&self, text: &str) -> String {
        match self.splitter.split(text).into_iter().next() {
            Some(chunk) => chunk,
            None => text.chars().take(CONTEXT_FALLBACK_CHARS).collect(),
        }
    }
}
