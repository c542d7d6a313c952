// WHY: read-only token container mirroring one annotator response
// All derived text comes from token offsets so whitespace survives the round trip

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;
use crate::annotators::{Annotator, AnnotatorSet};
use crate::error::{Error, Result};
use crate::offsets::{OffsetIndex, OffsetUnit, Span};

/// One lexical unit with its location in the original input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Surface form, bracket escapes decoded
    pub text: String,
    /// Original input from this token up to the next token's start
    pub text_with_ws: String,
    pub span: Span,
    /// `None` when the pos stage did not run
    pub pos: Option<String>,
    pub lemma: Option<String>,
    pub ner: Option<String>,
}

impl Token {
    /// Token carrying only text and location; tags are "not computed"
    pub fn new(text: impl Into<String>, text_with_ws: impl Into<String>, span: Span) -> Self {
        Self {
            text: text.into(),
            text_with_ws: text_with_ws.into(),
            span,
            pos: None,
            lemma: None,
            ner: None,
        }
    }
}

/// Per-container options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokensOptions {
    /// NER label that marks tokens outside any entity
    pub non_entity_tag: String,
    /// Unit of the offsets carried by the tokens
    pub offset_unit: OffsetUnit,
}

impl Default for TokensOptions {
    fn default() -> Self {
        Self {
            non_entity_tag: "O".to_string(),
            offset_unit: OffsetUnit::default(),
        }
    }
}

/// Ordered tokens for one annotator response, or a contiguous view over them
///
/// Root containers built from a response keep the decoded [`Annotation`] so
/// they can split sentences; views made with [`Tokens::slice`] share token
/// storage with their parent but drop the response.
#[derive(Debug, Clone)]
pub struct Tokens {
    data: Arc<[Token]>,
    range: Range<usize>,
    annotators: AnnotatorSet,
    options: TokensOptions,
    annotation: Option<Arc<Annotation>>,
}

impl Tokens {
    /// Build a container, checking that spans are ordered and non-overlapping
    pub fn new(data: Vec<Token>, annotators: AnnotatorSet, options: TokensOptions) -> Result<Self> {
        check_monotonic(&data)?;
        let len = data.len();
        Ok(Self {
            data: data.into(),
            range: 0..len,
            annotators,
            options,
            annotation: None,
        })
    }

    /// Build a root container that also owns the full response
    pub fn with_annotation(
        data: Vec<Token>,
        annotators: AnnotatorSet,
        options: TokensOptions,
        annotation: Annotation,
    ) -> Result<Self> {
        let expected = annotation.token_count();
        if expected != data.len() {
            return Err(Error::MalformedResponse(format!(
                "response has {expected} tokens but {} were decoded",
                data.len()
            )));
        }
        let mut tokens = Self::new(data, annotators, options)?;
        tokens.annotation = Some(Arc::new(annotation));
        Ok(tokens)
    }

    /// The number of tokens
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn as_slice(&self) -> &[Token] {
        &self.data[self.range.clone()]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.as_slice().iter()
    }

    pub fn annotators(&self) -> AnnotatorSet {
        self.annotators
    }

    pub fn options(&self) -> &TokensOptions {
        &self.options
    }

    /// Full response, present on root containers only
    pub fn annotation(&self) -> Option<&Annotation> {
        self.annotation.as_deref()
    }

    /// View over tokens `[i, j)`; omitted bounds default to the full range
    pub fn slice(&self, i: Option<usize>, j: Option<usize>) -> Result<Tokens> {
        let len = self.len();
        let start = i.unwrap_or(0);
        let end = j.unwrap_or(len);
        if start > end || end > len {
            return Err(Error::IndexOutOfRange { start, end, len });
        }
        Ok(Tokens {
            data: Arc::clone(&self.data),
            range: self.range.start + start..self.range.start + end,
            annotators: self.annotators,
            options: self.options.clone(),
            annotation: None,
        })
    }

    /// Original text with whitespace reinserted, trimmed at both ends
    pub fn untokenize(&self) -> String {
        self.joined().trim().to_string()
    }

    fn joined(&self) -> String {
        self.iter().map(|t| t.text_with_ws.as_str()).collect()
    }

    /// Surface form of each token
    pub fn words(&self, uncased: bool) -> Vec<String> {
        self.iter()
            .map(|t| if uncased { t.text.to_lowercase() } else { t.text.clone() })
            .collect()
    }

    /// `[begin, end)` character offsets of each token
    pub fn offsets(&self) -> Vec<Span> {
        self.iter().map(|t| t.span).collect()
    }

    /// Part-of-speech tags, if the pos annotator was requested
    pub fn pos(&self) -> Result<Vec<&str>> {
        self.tags(Annotator::Pos, |t| t.pos.as_deref())
    }

    /// Lemmas, if the lemma annotator was requested
    pub fn lemmas(&self) -> Result<Vec<&str>> {
        self.tags(Annotator::Lemma, |t| t.lemma.as_deref())
    }

    /// Named-entity tags, if the ner annotator was requested
    pub fn entities(&self) -> Result<Vec<&str>> {
        self.tags(Annotator::Ner, |t| t.ner.as_deref())
    }

    fn tags<'s>(&'s self, annotator: Annotator, field: impl Fn(&'s Token) -> Option<&'s str>) -> Result<Vec<&'s str>> {
        if !self.annotators.contains(annotator) {
            return Err(Error::UnavailableAnnotation(annotator));
        }
        self.iter()
            .map(field)
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::UnavailableAnnotation(annotator))
    }

    /// Index ranges of all grams of length 1..=n, by start then length
    ///
    /// `filter` sees each candidate as its word list and returns `true` to drop it.
    pub fn ngram_ranges(
        &self,
        n: usize,
        uncased: bool,
        filter: Option<&dyn Fn(&[String]) -> bool>,
    ) -> Vec<Range<usize>> {
        gram_ranges(&self.words(uncased), n, filter)
    }

    /// All grams of length 1..=n as word lists
    pub fn ngrams(
        &self,
        n: usize,
        uncased: bool,
        filter: Option<&dyn Fn(&[String]) -> bool>,
    ) -> Vec<Vec<String>> {
        let words = self.words(uncased);
        gram_ranges(&words, n, filter)
            .into_iter()
            .map(|range| words[range].to_vec())
            .collect()
    }

    /// All grams of length 1..=n joined with single spaces
    pub fn ngram_strings(
        &self,
        n: usize,
        uncased: bool,
        filter: Option<&dyn Fn(&[String]) -> bool>,
    ) -> Vec<String> {
        let words = self.words(uncased);
        gram_ranges(&words, n, filter)
            .into_iter()
            .map(|range| words[range].join(" "))
            .collect()
    }

    /// Runs of consecutive tokens sharing one entity tag, as (text, tag)
    pub fn entity_groups(&self) -> Result<Vec<(String, String)>> {
        let entities = self.entities()?;
        let non_entity = self.options.non_entity_tag.as_str();
        let mut groups = Vec::new();
        let mut idx = 0;
        while idx < entities.len() {
            let tag = entities[idx];
            if tag == non_entity {
                idx += 1;
                continue;
            }
            let start = idx;
            while idx < entities.len() && entities[idx] == tag {
                idx += 1;
            }
            let text = self.slice(Some(start), Some(idx))?.untokenize();
            groups.push((text, tag.to_string()));
        }
        Ok(groups)
    }

    /// Sentences as given by the response, whitespace-exact and trimmed
    pub fn ssplit(&self) -> Result<Vec<String>> {
        let annotation = self.annotation.as_ref().ok_or(Error::NoResponseAvailable)?;
        let Some(first) = self.as_slice().first() else {
            return Ok(Vec::new());
        };

        // WHY: the joined text starts at the first token, not at offset zero
        let base = first.span.begin;
        let joined = self.joined();
        let index = OffsetIndex::new(&joined, self.options.offset_unit);

        let mut sentences = Vec::with_capacity(annotation.sentences.len());
        for sentence in &annotation.sentences {
            let Some(span) = sentence.span() else {
                continue;
            };
            let local = Span::new(span.begin.saturating_sub(base), span.end.saturating_sub(base));
            let text = index.slice_clamped(local).ok_or_else(|| {
                Error::MalformedResponse(format!(
                    "sentence offsets [{}, {}) do not fall on character boundaries",
                    span.begin, span.end
                ))
            })?;
            sentences.push(text.trim().to_string());
        }
        Ok(sentences)
    }

    /// One view per response sentence
    pub fn sentences(&self) -> Result<Vec<Tokens>> {
        let annotation = self.annotation.as_ref().ok_or(Error::NoResponseAvailable)?;
        let mut start = 0;
        let mut views = Vec::with_capacity(annotation.sentences.len());
        for sentence in &annotation.sentences {
            let end = start + sentence.tokens.len();
            views.push(self.slice(Some(start), Some(end))?);
            start = end;
        }
        Ok(views)
    }
}

impl<'a> IntoIterator for &'a Tokens {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn gram_ranges(
    words: &[String],
    n: usize,
    filter: Option<&dyn Fn(&[String]) -> bool>,
) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    for start in 0..words.len() {
        let longest = (start + n).min(words.len());
        for end in start + 1..=longest {
            let skip = filter.is_some_and(|f| f(&words[start..end]));
            if !skip {
                ranges.push(start..end);
            }
        }
    }
    ranges
}

fn check_monotonic(data: &[Token]) -> Result<()> {
    for token in data {
        if token.span.begin > token.span.end {
            return Err(Error::MalformedResponse(format!(
                "token '{}' has reversed span [{}, {})",
                token.text, token.span.begin, token.span.end
            )));
        }
    }
    for pair in data.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.span.begin <= prev.span.begin || prev.span.end > next.span.begin {
            return Err(Error::MalformedResponse(format!(
                "token spans [{}, {}) and [{}, {}) overlap or are out of order",
                prev.span.begin, prev.span.end, next.span.begin, next.span.end
            )));
        }
    }
    Ok(())
}
