// Integration test utilities: an in-process stand-in for the CoreNLP shell
// WHY: protocol tests need the real prompt/JSON turn-taking without a JVM

#![allow(dead_code)]

use coresplit::{AnnotatorConfig, AnnotatorSession};
use serde_json::{json, Value};
use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

pub const PROMPT: &str = "NLP> ";

pub const BANNER: &str = "[main] INFO edu.stanford.nlp.pipeline.StanfordCoreNLP - Adding annotator tokenize\n\
[main] INFO edu.stanford.nlp.pipeline.StanfordCoreNLP - Adding annotator ssplit\n\
\n\
Entering interactive shell. Type q RETURN or EOF to quit.\n";

/// Two Arabic sentences separated by a single space
pub const ARABIC_TEXT: &str = "تخرج توم من المدرسة الإعدادية رقم 1. يحب القراءة.";

/// How the fake shell answers each request line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Log noise, compact JSON, prompt
    Answer,
    /// Pretty-printed JSON with CRLF line endings, as seen through a pty
    AnswerPretty,
    /// Prompt only
    NoPayload,
    /// Read requests, never answer
    Hang,
}

const PUNCTUATION: &[char] = &['(', ')', '[', ']', '{', '}', '.', ',', '!', '?'];
const SENTENCE_END: &[char] = &['.', '!', '?'];

fn escape(word: &str) -> &str {
    match word {
        "(" => "-LRB-",
        ")" => "-RRB-",
        "[" => "-LSB-",
        "]" => "-RSB-",
        "{" => "-LCB-",
        "}" => "-RCB-",
        other => other,
    }
}

fn entity(word: &str) -> &'static str {
    match word {
        "Ada" | "Lovelace" | "Babbage" => "PERSON",
        "London" | "Paris" => "LOCATION",
        _ => "O",
    }
}

/// Character spans of tokens: single punctuation marks or runs of other non-space chars
pub fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
        } else if PUNCTUATION.contains(&ch) {
            spans.push((i, i + 1));
            i += 1;
        } else {
            let begin = i;
            while i < chars.len() && !chars[i].is_whitespace() && !PUNCTUATION.contains(&chars[i]) {
                i += 1;
            }
            spans.push((begin, i));
        }
    }
    spans
}

/// UTF-16 offset of every char index, end of text included (Java `char` units)
fn java_offsets(chars: &[char]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(chars.len() + 1);
    let mut offset = 0;
    offsets.push(offset);
    for ch in chars {
        offset += ch.len_utf16();
        offsets.push(offset);
    }
    offsets
}

/// CoreNLP-shaped JSON for `text`; every tag field is always filled in
///
/// Offsets count UTF-16 code units, as the Java shell reports them.
pub fn annotate(text: &str) -> Value {
    let chars: Vec<char> = text.chars().collect();
    let java = java_offsets(&chars);
    let mut sentences = Vec::new();
    let mut current: Vec<Value> = Vec::new();

    for (begin, end) in token_spans(text) {
        let original: String = chars[begin..end].iter().collect();
        let is_punct = end - begin == 1 && PUNCTUATION.contains(&chars[begin]);
        let ends_sentence = end - begin == 1 && SENTENCE_END.contains(&chars[begin]);
        current.push(json!({
            "index": current.len() + 1,
            "word": escape(&original),
            "originalText": original,
            "characterOffsetBegin": java[begin],
            "characterOffsetEnd": java[end],
            "pos": if is_punct { "PUNCT" } else { "NN" },
            "lemma": original.to_lowercase(),
            "ner": entity(&original),
            "before": "",
            "after": "",
        }));
        if ends_sentence {
            let tokens = std::mem::take(&mut current);
            sentences.push(json!({ "index": sentences.len(), "tokens": tokens }));
        }
    }
    if !current.is_empty() {
        sentences.push(json!({ "index": sentences.len(), "tokens": current }));
    }
    json!({ "sentences": sentences })
}

/// Run the fake shell on one end of a stream; returns every request line received
pub async fn serve(stream: DuplexStream, behavior: Behavior) -> Vec<String> {
    let (read_half, mut write_half) = split(stream);
    let mut received = Vec::new();

    write_half.write_all(BANNER.as_bytes()).await.unwrap();
    write_half.write_all(PROMPT.as_bytes()).await.unwrap();
    write_half.flush().await.unwrap();

    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        received.push(line.clone());
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }

        let reply = match behavior {
            Behavior::Answer => format!(
                "[pool-1-thread-1] INFO edu.stanford.nlp.pipeline - {{annotating}}\n{}\n{PROMPT}",
                annotate(&line)
            ),
            Behavior::AnswerPretty => {
                let pretty = serde_json::to_string_pretty(&annotate(&line)).unwrap();
                format!("{}\r\n{PROMPT}", pretty.replace('\n', "\r\n"))
            }
            Behavior::NoPayload => PROMPT.to_string(),
            Behavior::Hang => continue,
        };
        if write_half.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
        let _ = write_half.flush().await;
    }
    received
}

/// Config with short timeouts for tests
pub fn test_config() -> AnnotatorConfig {
    AnnotatorConfig {
        startup_timeout_secs: 2,
        request_timeout_secs: 2,
        ..AnnotatorConfig::default()
    }
}

/// Session attached to a fake shell running on a background task
pub async fn fake_session(
    config: AnnotatorConfig,
    behavior: Behavior,
) -> (AnnotatorSession, JoinHandle<Vec<String>>) {
    let (client, server) = duplex(1 << 16);
    let server_task = tokio::spawn(serve(server, behavior));
    let (client_read, client_write) = split(client);
    let session = AnnotatorSession::attach(client_write, client_read, config)
        .await
        .expect("fake annotator should become ready");
    (session, server_task)
}
