// WHY: one long-lived annotator process, driven turn by turn over its stdin/stdout
// The protocol has no request ids: a response is whatever precedes the next prompt marker

use std::fmt;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::time;
use tracing::{debug, info, warn};

use crate::annotation::{build_tokens, parse_payload, quit_tokens, Annotation};
use crate::config::AnnotatorConfig;
use crate::error::{Error, Result};
use crate::launch::LaunchSpec;
use crate::tokens::Tokens;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Read size for the annotator output stream
const READ_CHUNK: usize = 8192;

/// How long shutdown waits for a clean exit after closing stdin
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the first prompt
    Starting,
    /// Prompt seen, no request in flight
    Ready,
    /// Request sent, waiting for the prompt that ends its response
    Busy,
    /// A request failed mid-turn; needs `restart()` or `shutdown()`
    Desynchronized,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Starting => "starting",
            SessionState::Ready => "ready",
            SessionState::Busy => "busy",
            SessionState::Desynchronized => "desynchronized",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Session with one external annotator process
///
/// Requests are strictly serialized: `tokenize` takes `&mut self`, so sharing a
/// session between tasks needs an outer lock (see [`crate::SentenceSplitter`]).
pub struct AnnotatorSession {
    config: AnnotatorConfig,
    launch: Option<LaunchSpec>,
    child: Option<Child>,
    writer: Option<BoxedWriter>,
    reader: Option<BoxedReader>,
    /// Output read past the last prompt marker
    pending: Vec<u8>,
    state: SessionState,
    requests_served: u64,
}

impl fmt::Debug for AnnotatorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatorSession")
            .field("state", &self.state)
            .field("pid", &self.pid())
            .field("requests_served", &self.requests_served)
            .field("pending_bytes", &self.pending.len())
            .finish()
    }
}

impl AnnotatorSession {
    /// Launch CoreNLP as described by `config` and wait for its prompt
    pub async fn launch(config: AnnotatorConfig) -> Result<Self> {
        let spec = LaunchSpec::corenlp(&config);
        Self::launch_with(config, spec).await
    }

    /// Launch an arbitrary annotator command speaking the same protocol
    pub async fn launch_with(config: AnnotatorConfig, spec: LaunchSpec) -> Result<Self> {
        config.validate()?;
        let (child, stdin, stdout) = spawn(&spec)?;
        let mut session = Self::from_parts(config, Box::new(stdin), Box::new(stdout));
        session.launch = Some(spec);
        session.child = Some(child);
        session.await_ready().await?;
        Ok(session)
    }

    /// Run the protocol over already-open streams
    pub async fn attach<W, R>(writer: W, reader: R, config: AnnotatorConfig) -> Result<Self>
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        config.validate()?;
        let mut session = Self::from_parts(config, Box::new(writer), Box::new(reader));
        session.await_ready().await?;
        Ok(session)
    }

    fn from_parts(config: AnnotatorConfig, writer: BoxedWriter, reader: BoxedReader) -> Self {
        Self {
            config,
            launch: None,
            child: None,
            writer: Some(writer),
            reader: Some(reader),
            pending: Vec::new(),
            state: SessionState::Starting,
            requests_served: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    /// Number of requests answered by the annotator (local answers excluded)
    pub fn requests_served(&self) -> u64 {
        self.requests_served
    }

    /// OS process id, for launched sessions that are still running
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    async fn await_ready(&mut self) -> Result<()> {
        let timeout = self.config.startup_timeout();
        let started = Instant::now();
        let outcome = match time::timeout(timeout, self.read_until_prompt()).await {
            Ok(result) => result,
            Err(_) => Err(Error::StartupTimeout(timeout)),
        };

        match outcome {
            Ok(banner) => {
                self.state = SessionState::Ready;
                info!(
                    pid = ?self.pid(),
                    banner_bytes = banner.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Annotator ready"
                );
                Ok(())
            }
            Err(e) => {
                warn!("Annotator failed to start: {}", e);
                self.shutdown().await;
                Err(e)
            }
        }
    }

    /// Read until the next prompt marker and return everything before it
    async fn read_until_prompt(&mut self) -> Result<Vec<u8>> {
        let marker = self.config.prompt.as_bytes();
        let reader = self.reader.as_mut().ok_or(Error::SessionClosed)?;
        let mut scanned = 0;
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            if let Some(pos) = find_marker(&self.pending[scanned..], marker) {
                let at = scanned + pos;
                let response = self.pending[..at].to_vec();
                self.pending.drain(..at + marker.len());
                return Ok(response);
            }
            // WHY: a marker may straddle two reads, so rescan its possible prefix
            scanned = self.pending.len().saturating_sub(marker.len() - 1);

            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::ProcessExited);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Annotate `text` and return its tokens
    pub async fn tokenize(&mut self, text: &str) -> Result<Tokens> {
        if text.contains(self.config.prompt.as_str()) {
            return Err(Error::InvalidInput(format!(
                "text contains the reserved prompt marker '{}'",
                self.config.prompt
            )));
        }
        match self.state {
            SessionState::Ready => {}
            SessionState::Closed => return Err(Error::SessionClosed),
            SessionState::Starting | SessionState::Busy | SessionState::Desynchronized => {
                return Err(Error::Desynchronized)
            }
        }

        let annotators = self.config.annotators;
        let options = self.config.tokens_options();

        // The annotator exits on this input rather than answering it
        if self.config.is_quit_token(text) {
            debug!("Answering quit token locally");
            return quit_tokens(text, annotators, options);
        }
        // An empty line gets no payload back, only another prompt
        if text.trim().is_empty() {
            return Tokens::with_annotation(Vec::new(), annotators, options, Annotation::default());
        }

        // WHY: the protocol is line-oriented; same-length replacement keeps offsets valid
        let line = text.replace(['\r', '\n'], " ");

        self.state = SessionState::Busy;
        let started = Instant::now();
        let raw = match self.round_trip(&line).await {
            Ok(raw) => raw,
            Err(e) => {
                self.state = if e.desynchronizes() {
                    SessionState::Desynchronized
                } else {
                    SessionState::Ready
                };
                warn!(state = %self.state, "Annotator request failed: {}", e);
                return Err(e);
            }
        };
        self.state = SessionState::Ready;
        self.requests_served += 1;

        debug!(
            request_chars = line.chars().count(),
            response_bytes = raw.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Annotator round trip complete"
        );

        let output = String::from_utf8_lossy(&raw);
        let annotation = parse_payload(&output)?;
        build_tokens(text, annotation, annotators, options)
    }

    async fn round_trip(&mut self, line: &str) -> Result<Vec<u8>> {
        let timeout = self.config.request_timeout();
        match time::timeout(timeout, self.exchange(line)).await {
            Ok(Err(Error::ProcessExited)) => Err(Error::ProtocolError(
                "annotator output ended before the prompt reappeared".to_string(),
            )),
            Ok(result) => result,
            Err(_) => Err(Error::ProtocolError(format!(
                "prompt not seen within {timeout:?}"
            ))),
        }
    }

    async fn exchange(&mut self, line: &str) -> Result<Vec<u8>> {
        let writer = self.writer.as_mut().ok_or(Error::SessionClosed)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        self.read_until_prompt().await
    }

    /// Release the process; safe to call repeatedly or after the process died
    pub async fn shutdown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        // Closing stdin lets the shell exit on EOF
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.reader = None;
        self.pending.clear();

        if let Some(mut child) = self.child.take() {
            match time::timeout(EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "Annotator exited"),
                Ok(Err(e)) => warn!("Failed to reap annotator: {}", e),
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill annotator: {}", e);
                    }
                }
            }
        }

        self.state = SessionState::Closed;
        info!(requests_served = self.requests_served, "Annotator session closed");
    }

    /// Shut down and relaunch a session created with `launch`/`launch_with`
    pub async fn restart(&mut self) -> Result<()> {
        let spec = self.launch.clone().ok_or_else(|| {
            Error::Config("session is attached to external streams and cannot be relaunched".to_string())
        })?;
        self.shutdown().await;

        info!("Restarting annotator");
        let (child, stdin, stdout) = spawn(&spec)?;
        self.child = Some(child);
        self.writer = Some(Box::new(stdin));
        self.reader = Some(Box::new(stdout));
        self.state = SessionState::Starting;
        self.await_ready().await
    }
}

fn spawn(spec: &LaunchSpec) -> Result<(Child, ChildStdin, ChildStdout)> {
    info!(command = %spec, "Launching annotator");
    let mut child = spec.command().spawn()?;
    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    Ok((child, stdin, stdout))
}

fn missing_pipe(name: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("annotator {name} was not piped"),
    ))
}

fn find_marker(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || haystack.len() < marker.len() {
        return None;
    }
    haystack.windows(marker.len()).position(|window| window == marker)
}
