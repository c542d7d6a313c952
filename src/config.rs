// WHY: everything the session needs to launch and talk to the annotator, in one serde record
// Loaded from JSON, then overridden by CLI flags

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::annotators::AnnotatorSet;
use crate::error::{Error, Result};
use crate::offsets::OffsetUnit;
use crate::tokens::TokensOptions;

/// Literal the CoreNLP shell prints when it is waiting for input
pub const DEFAULT_PROMPT: &str = "NLP>";

/// Input on which the CoreNLP shell exits instead of answering
pub const DEFAULT_QUIT_TOKEN: &str = "q";

/// Trimmed, case-insensitive comparison against the quit token
///
/// The CoreNLP shell exits on `q` whatever else is configured, so `q` always matches.
pub fn matches_quit_token(text: &str, quit_token: &str) -> bool {
    let text = text.trim().to_lowercase();
    text == DEFAULT_QUIT_TOKEN || text == quit_token.trim().to_lowercase()
}

/// Annotator session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Optional annotators to request on top of tokenize and ssplit
    pub annotators: AnnotatorSet,
    /// Java executable
    pub java: PathBuf,
    /// Java heap size, passed as `-mx<memory>`
    pub memory: String,
    /// Classpath holding the CoreNLP jars
    pub classpath: String,
    /// Language properties file, e.g. `StanfordCoreNLP-arabic.properties`
    pub properties: Option<String>,
    /// Values joined into `-tokenize.options`
    pub tokenize_options: Vec<String>,
    /// Route the annotator's stderr into the stream scanned for the prompt
    pub merge_stderr: bool,
    /// Ready-prompt marker terminating each response
    pub prompt: String,
    /// Extra request text that makes the annotator exit, on top of `q`
    pub quit_token: String,
    pub startup_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Label of tokens outside any named entity
    pub non_entity_tag: String,
    /// Unit the annotator counts character offsets in; CoreNLP uses UTF-16
    pub offset_unit: OffsetUnit,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            annotators: AnnotatorSet::empty(),
            java: PathBuf::from("java"),
            memory: "2g".to_string(),
            classpath: "./stanford-corenlp-4.2.0/*".to_string(),
            properties: Some("StanfordCoreNLP-arabic.properties".to_string()),
            tokenize_options: vec![
                "untokenizable=noneDelete".to_string(),
                "invertible=true".to_string(),
            ],
            merge_stderr: true,
            prompt: DEFAULT_PROMPT.to_string(),
            quit_token: DEFAULT_QUIT_TOKEN.to_string(),
            startup_timeout_secs: 60,
            request_timeout_secs: 60,
            non_entity_tag: "O".to_string(),
            offset_unit: OffsetUnit::default(),
        }
    }
}

impl AnnotatorConfig {
    /// Load configuration from a JSON file; missing keys take defaults
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded annotator configuration");
        Ok(config)
    }

    /// Reject settings that would make the protocol unusable
    pub fn validate(&self) -> Result<()> {
        if self.prompt.is_empty() {
            return Err(Error::Config("prompt marker must not be empty".to_string()));
        }
        if self.prompt.contains('\n') {
            return Err(Error::Config("prompt marker must fit on one line".to_string()));
        }
        if self.quit_token.trim().is_empty() {
            return Err(Error::Config("quit token must not be blank".to_string()));
        }
        if self.startup_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be at least one second".to_string()));
        }
        Ok(())
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether `text` is the quit token (trimmed, case-insensitive)
    pub fn is_quit_token(&self, text: &str) -> bool {
        matches_quit_token(text, &self.quit_token)
    }

    /// Fresh options for one container
    pub fn tokens_options(&self) -> TokensOptions {
        TokensOptions {
            non_entity_tag: self.non_entity_tag.clone(),
            offset_unit: self.offset_unit,
        }
    }
}
