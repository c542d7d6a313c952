// WHY: annotator names drive both the launch pipeline and which tag views are meaningful
// A fixed enum replaces string sets so gating is checked, never inferred from field presence

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named stage of text analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Annotator {
    Tokenize,
    Ssplit,
    Pos,
    Lemma,
    Ner,
}

impl Annotator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Annotator::Tokenize => "tokenize",
            Annotator::Ssplit => "ssplit",
            Annotator::Pos => "pos",
            Annotator::Lemma => "lemma",
            Annotator::Ner => "ner",
        }
    }
}

impl fmt::Display for Annotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Annotator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tokenize" => Ok(Annotator::Tokenize),
            "ssplit" => Ok(Annotator::Ssplit),
            "pos" => Ok(Annotator::Pos),
            "lemma" => Ok(Annotator::Lemma),
            "ner" => Ok(Annotator::Ner),
            other => Err(Error::Config(format!("unknown annotator '{other}'"))),
        }
    }
}

/// The optional annotators a caller asked for
///
/// Tokenization and sentence splitting always run and are not tracked here.
/// Gating of tag views uses exactly this set: asking for `ner` launches the
/// pos and lemma stages too, but `lemmas()` still reports them unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Annotator>", into = "Vec<Annotator>")]
pub struct AnnotatorSet {
    pos: bool,
    lemma: bool,
    ner: bool,
}

impl AnnotatorSet {
    /// Tokenize and sentence split only
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self { pos: true, lemma: true, ner: true }
    }

    pub fn with(mut self, annotator: Annotator) -> Self {
        match annotator {
            Annotator::Pos => self.pos = true,
            Annotator::Lemma => self.lemma = true,
            Annotator::Ner => self.ner = true,
            Annotator::Tokenize | Annotator::Ssplit => {}
        }
        self
    }

    /// Whether the caller requested `annotator`
    pub fn contains(&self, annotator: Annotator) -> bool {
        match annotator {
            Annotator::Tokenize | Annotator::Ssplit => true,
            Annotator::Pos => self.pos,
            Annotator::Lemma => self.lemma,
            Annotator::Ner => self.ner,
        }
    }

    /// Stages the annotator process must run, each implying the ones before it
    pub fn pipeline(&self) -> Vec<Annotator> {
        let mut stages = vec![Annotator::Tokenize, Annotator::Ssplit];
        if self.ner {
            stages.extend([Annotator::Pos, Annotator::Lemma, Annotator::Ner]);
        } else if self.lemma {
            stages.extend([Annotator::Pos, Annotator::Lemma]);
        } else if self.pos {
            stages.push(Annotator::Pos);
        }
        stages
    }

    /// Comma-joined pipeline, as passed to `-annotators`
    pub fn pipeline_arg(&self) -> String {
        self.pipeline()
            .iter()
            .map(Annotator::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    fn requested(&self) -> Vec<Annotator> {
        [Annotator::Pos, Annotator::Lemma, Annotator::Ner]
            .into_iter()
            .filter(|a| self.contains(*a))
            .collect()
    }
}

impl From<Vec<Annotator>> for AnnotatorSet {
    fn from(annotators: Vec<Annotator>) -> Self {
        annotators.into_iter().fold(Self::empty(), AnnotatorSet::with)
    }
}

impl From<AnnotatorSet> for Vec<Annotator> {
    fn from(set: AnnotatorSet) -> Self {
        set.requested()
    }
}

impl FromIterator<Annotator> for AnnotatorSet {
    fn from_iter<I: IntoIterator<Item = Annotator>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), AnnotatorSet::with)
    }
}

impl FromStr for AnnotatorSet {
    type Err = Error;

    /// Parse a comma separated list such as `pos,ner`; empty means none
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Annotator::from_str)
            .collect()
    }
}
