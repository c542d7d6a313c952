pub mod annotation;
pub mod annotators;
pub mod config;
pub mod error;
pub mod launch;
pub mod offsets;
pub mod session;
pub mod splitter;
pub mod tokens;

// Re-export main types for convenient access
pub use annotators::{Annotator, AnnotatorSet};
pub use config::AnnotatorConfig;
pub use error::{Error, Result};
pub use launch::LaunchSpec;
pub use offsets::{OffsetIndex, OffsetUnit, Span};
pub use session::{AnnotatorSession, SessionState};
pub use splitter::SentenceSplitter;
pub use tokens::{Token, Tokens, TokensOptions};

// Re-export response decoding for callers holding raw annotator output
pub use annotation::{build_tokens, parse_payload, Annotation};
