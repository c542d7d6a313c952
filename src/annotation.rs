// WHY: typed model of the annotator's JSON output plus the steps that turn it into Tokens
// Only the fields the container needs are modeled; everything else in the payload is ignored

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotators::AnnotatorSet;
use crate::error::{Error, Result};
use crate::offsets::{OffsetIndex, Span};
use crate::tokens::{Token, Tokens, TokensOptions};

/// Bracket escape codes the tokenizer emits in place of literal brackets
pub const BRACKET_ESCAPES: &[(&str, &str)] = &[
    ("-LRB-", "("),
    ("-RRB-", ")"),
    ("-LSB-", "["),
    ("-RSB-", "]"),
    ("-LCB-", "{"),
    ("-RCB-", "}"),
];

/// Top-level response record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Annotation {
    pub sentences: Vec<SentenceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentenceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default)]
    pub tokens: Vec<TokenRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    pub character_offset_begin: usize,
    pub character_offset_end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl TokenRecord {
    pub fn span(&self) -> Span {
        Span::new(self.character_offset_begin, self.character_offset_end)
    }
}

impl SentenceRecord {
    /// From the first token's begin to the last token's end; `None` for an empty sentence
    pub fn span(&self) -> Option<Span> {
        let first = self.tokens.first()?;
        let last = self.tokens.last()?;
        Some(Span::new(first.character_offset_begin, last.character_offset_end))
    }
}

impl Annotation {
    pub fn token_count(&self) -> usize {
        self.sentences.iter().map(|s| s.tokens.len()).sum()
    }

    /// Tokens of all sentences in order
    pub fn flat_tokens(&self) -> impl Iterator<Item = &TokenRecord> {
        self.sentences.iter().flat_map(|s| s.tokens.iter())
    }
}

/// Decode a bracket escape to its literal character; other words pass through
pub fn normalize_bracket(word: &str) -> &str {
    BRACKET_ESCAPES
        .iter()
        .find(|(escape, _)| *escape == word)
        .map_or(word, |(_, literal)| *literal)
}

/// Start of the JSON payload inside raw output, skipping log lines before it
pub fn locate_payload(output: &str) -> Option<&str> {
    output
        .match_indices('{')
        .map(|(start, _)| start)
        .find(|&start| output[start + 1..].trim_start().starts_with("\"sentences\""))
        .map(|start| &output[start..])
}

/// Locate and parse the payload; bytes after the JSON object are ignored
pub fn parse_payload(output: &str) -> Result<Annotation> {
    let payload = locate_payload(output).ok_or_else(|| {
        Error::MalformedResponse(format!(
            "no sentences payload in {} bytes of output",
            output.len()
        ))
    })?;

    let mut stream = serde_json::Deserializer::from_str(payload).into_iter::<Annotation>();
    match stream.next() {
        Some(Ok(annotation)) => {
            debug!(
                sentences = annotation.sentences.len(),
                tokens = annotation.token_count(),
                "Parsed annotator payload"
            );
            Ok(annotation)
        }
        Some(Err(e)) => Err(Error::MalformedResponse(format!("invalid JSON payload: {e}"))),
        None => Err(Error::MalformedResponse("empty payload".to_string())),
    }
}

/// Build a root container for `text` from a decoded response
///
/// Each token's trailing-whitespace text is sliced from `text` itself, so it
/// stays a faithful copy of the input even where the surface form was rewritten.
pub fn build_tokens(
    text: &str,
    annotation: Annotation,
    annotators: AnnotatorSet,
    options: TokensOptions,
) -> Result<Tokens> {
    let index = OffsetIndex::new(text, options.offset_unit);
    let records: Vec<&TokenRecord> = annotation.flat_tokens().collect();

    let mut data = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let span = record.span();
        if index.slice(span).is_none() {
            return Err(Error::MalformedResponse(format!(
                "token '{}' at [{}, {}) lies outside the {} character input",
                record.word,
                span.begin,
                span.end,
                index.len()
            )));
        }
        let ws_end = records
            .get(i + 1)
            .map_or(span.end, |next| next.character_offset_begin);
        let text_with_ws = index
            .slice_clamped(Span::new(span.begin, ws_end))
            .ok_or_else(|| {
                Error::MalformedResponse(format!(
                    "offsets [{}, {}) of '{}' do not match the input",
                    span.begin, ws_end, record.word
                ))
            })?;

        data.push(Token {
            text: normalize_bracket(&record.word).to_string(),
            text_with_ws: text_with_ws.to_string(),
            span,
            pos: record.pos.clone(),
            lemma: record.lemma.clone(),
            ner: record.ner.clone(),
        });
    }

    Tokens::with_annotation(data, annotators, options, annotation)
}

/// Single-token container answering the quit token locally
///
/// The annotator exits on this input instead of replying, so the response is
/// synthesized: the trimmed text as one token with fixed tags.
pub fn quit_tokens(text: &str, annotators: AnnotatorSet, options: TokensOptions) -> Result<Tokens> {
    let word = text.trim();
    let byte_start = text.find(word).unwrap_or(0);
    let begin = options.offset_unit.measure(&text[..byte_start]);
    let end = begin + options.offset_unit.measure(word);

    let token = Token {
        text: word.to_string(),
        text_with_ws: text[byte_start..].to_string(),
        span: Span::new(begin, end),
        pos: Some("NN".to_string()),
        lemma: Some(word.to_lowercase()),
        ner: Some(options.non_entity_tag.clone()),
    };
    Tokens::new(vec![token], annotators, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotators::Annotator;

    const COMPACT: &str = r#"{"sentences":[{"index":0,"tokens":[{"index":1,"word":"-LRB-","originalText":"(","characterOffsetBegin":0,"characterOffsetEnd":1,"pos":"-LRB-","before":"","after":""},{"index":2,"word":"hi","originalText":"hi","characterOffsetBegin":1,"characterOffsetEnd":3,"pos":"UH","before":"","after":""},{"index":3,"word":"-RRB-","originalText":")","characterOffsetBegin":3,"characterOffsetEnd":4,"pos":"-RRB-","before":"","after":"  "}]},{"index":1,"tokens":[{"index":1,"word":"Go","characterOffsetBegin":6,"characterOffsetEnd":8,"pos":"VB"},{"index":2,"word":".","characterOffsetBegin":8,"characterOffsetEnd":9,"pos":"."}]}]}"#;

    #[test]
    fn test_normalize_bracket() {
        assert_eq!(normalize_bracket("-LRB-"), "(");
        assert_eq!(normalize_bracket("-RCB-"), "}");
        assert_eq!(normalize_bracket("-LRB"), "-LRB");
        assert_eq!(normalize_bracket("word"), "word");
    }

    #[test]
    fn test_locate_payload_skips_log_lines() {
        let output = "[main] INFO edu.stanford.nlp.pipeline - {not json}\r\n{\"sentences\":[]}\r\n";
        assert_eq!(locate_payload(output), Some("{\"sentences\":[]}\r\n"));

        let pretty = "noise\n{\n  \"sentences\": []\n}";
        assert!(locate_payload(pretty).unwrap().starts_with("{\n  \"sentences\""));

        assert_eq!(locate_payload("Adding annotator tokenize"), None);
    }

    #[test]
    fn test_parse_payload_ignores_trailing_bytes() {
        let output = format!("log line\n{COMPACT}\n");
        let annotation = parse_payload(&output).unwrap();
        assert_eq!(annotation.sentences.len(), 2);
        assert_eq!(annotation.token_count(), 5);
        assert_eq!(annotation.sentences[1].span(), Some(Span::new(6, 9)));
    }

    #[test]
    fn test_parse_payload_errors() {
        assert!(matches!(parse_payload("no payload here"), Err(Error::MalformedResponse(_))));
        assert!(matches!(
            parse_payload("{\"sentences\": [ {\"tokens\": [ }"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_build_tokens() {
        let text = "(hi)  Go.";
        let annotation = parse_payload(COMPACT).unwrap();
        let annotators = AnnotatorSet::empty().with(Annotator::Pos);
        let tokens = build_tokens(text, annotation, annotators, TokensOptions::default()).unwrap();

        assert_eq!(tokens.words(false), vec!["(", "hi", ")", "Go", "."]);
        assert_eq!(tokens.as_slice()[2].text_with_ws, ")  ");
        assert_eq!(tokens.as_slice()[4].text_with_ws, ".");
        assert_eq!(tokens.pos().unwrap(), vec!["-LRB-", "UH", "-RRB-", "VB", "."]);
        assert_eq!(tokens.untokenize(), text);
        assert_eq!(tokens.ssplit().unwrap(), vec!["(hi)", "Go."]);

        let sentences = tokens.sentences().unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1].words(false), vec!["Go", "."]);
    }

    #[test]
    fn test_build_tokens_rejects_offsets_past_input() {
        let annotation = parse_payload(COMPACT).unwrap();
        // WHY: begin offset 6 is past the end of a four character input
        let result = build_tokens("(hi)", annotation, AnnotatorSet::empty(), TokensOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_build_tokens_with_java_offsets_outside_bmp() {
        // The crab is two UTF-16 units, so every later offset is shifted by one char
        let payload = r#"{"sentences":[
            {"index":0,"tokens":[
                {"word":"🦀","characterOffsetBegin":0,"characterOffsetEnd":2},
                {"word":"a","characterOffsetBegin":3,"characterOffsetEnd":4},
                {"word":".","characterOffsetBegin":4,"characterOffsetEnd":5}]},
            {"index":1,"tokens":[
                {"word":"b","characterOffsetBegin":6,"characterOffsetEnd":7},
                {"word":"c","characterOffsetBegin":8,"characterOffsetEnd":9},
                {"word":".","characterOffsetBegin":9,"characterOffsetEnd":10}]}]}"#;
        let text = "🦀 a. b c. ";
        let annotation = parse_payload(payload).unwrap();
        let tokens = build_tokens(text, annotation, AnnotatorSet::empty(), TokensOptions::default()).unwrap();

        let with_ws: Vec<&str> = tokens.iter().map(|t| t.text_with_ws.as_str()).collect();
        assert_eq!(with_ws, vec!["🦀 ", "a", ". ", "b ", "c", "."]);
        assert_eq!(tokens.ssplit().unwrap(), vec!["🦀 a.", "b c."]);
        assert_eq!(tokens.untokenize(), text.trim());
    }

    #[test]
    fn test_quit_tokens() {
        let tokens = quit_tokens("  Q \n", AnnotatorSet::all(), TokensOptions::default()).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens.words(false), vec!["Q"]);
        assert_eq!(tokens.offsets(), vec![Span::new(2, 3)]);
        assert_eq!(tokens.as_slice()[0].text_with_ws, "Q \n");
        assert_eq!(tokens.untokenize(), "Q");
        assert_eq!(tokens.lemmas().unwrap(), vec!["q"]);
        assert!(matches!(tokens.ssplit(), Err(Error::NoResponseAvailable)));
    }
}
