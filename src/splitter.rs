// WHY: single entry point turning raw text into sentence strings
// The session sits behind an async mutex so concurrent callers take turns

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{matches_quit_token, AnnotatorConfig};
use crate::error::Result;
use crate::session::{AnnotatorSession, SessionState};
use crate::tokens::Tokens;

/// Sentence splitter backed by one annotator session
#[derive(Debug)]
pub struct SentenceSplitter {
    session: Mutex<AnnotatorSession>,
    quit_token: String,
}

impl SentenceSplitter {
    pub fn new(session: AnnotatorSession) -> Self {
        let quit_token = session.config().quit_token.clone();
        Self {
            session: Mutex::new(session),
            quit_token,
        }
    }

    /// Launch CoreNLP and wrap the resulting session
    pub async fn launch(config: AnnotatorConfig) -> Result<Self> {
        Ok(Self::new(AnnotatorSession::launch(config).await?))
    }

    /// Split `text` into whitespace-exact sentences
    ///
    /// The quit token comes back unchanged as a single sentence without
    /// reaching the session.
    pub async fn split_sentences(&self, text: &str) -> Result<Vec<String>> {
        if matches_quit_token(text, &self.quit_token) {
            return Ok(vec![text.to_string()]);
        }
        let tokens = self.tokenize(text).await?;
        let sentences = tokens.ssplit()?;
        debug!(
            tokens = tokens.len(),
            sentences = sentences.len(),
            "Split text into sentences"
        );
        Ok(sentences)
    }

    /// Tokenize through the shared session
    pub async fn tokenize(&self, text: &str) -> Result<Tokens> {
        let mut session = self.session.lock().await;
        session.tokenize(text).await
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    /// Relaunch the annotator after a desynchronizing failure
    pub async fn restart(&self) -> Result<()> {
        self.session.lock().await.restart().await
    }

    pub async fn shutdown(&self) {
        self.session.lock().await.shutdown().await;
    }

    pub fn into_session(self) -> AnnotatorSession {
        self.session.into_inner()
    }
}
