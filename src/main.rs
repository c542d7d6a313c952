use anyhow::{Context, Result};
use clap::Parser;
use coresplit::{AnnotatorConfig, AnnotatorSet, SentenceSplitter};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "coresplit")]
#[command(about = "Whitespace-exact sentence splitting through a CoreNLP shell")]
#[command(version)]
struct Args {
    /// Text to split; each stdin line is split separately when omitted
    text: Vec<String>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Extra annotators to request, e.g. "pos,lemma,ner"
    #[arg(long)]
    annotators: Option<AnnotatorSet>,

    /// Classpath holding the CoreNLP jars
    #[arg(long)]
    classpath: Option<String>,

    /// Java heap size
    #[arg(long)]
    mem: Option<String>,

    /// Java executable
    #[arg(long)]
    java: Option<PathBuf>,

    /// CoreNLP properties file
    #[arg(long, conflicts_with = "no_props")]
    props: Option<String>,

    /// Launch without a properties file (CoreNLP English defaults)
    #[arg(long)]
    no_props: bool,

    /// Startup and per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print each input's sentences as a JSON array
    #[arg(long)]
    json: bool,

    /// Debug-level logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut AnnotatorConfig) {
        if let Some(annotators) = self.annotators {
            config.annotators = annotators;
        }
        if let Some(classpath) = &self.classpath {
            config.classpath = classpath.clone();
        }
        if let Some(mem) = &self.mem {
            config.memory = mem.clone();
        }
        if let Some(java) = &self.java {
            config.java = java.clone();
        }
        if let Some(props) = &self.props {
            config.properties = Some(props.clone());
        }
        if self.no_props {
            config.properties = None;
        }
        if let Some(secs) = self.timeout_secs {
            config.startup_timeout_secs = secs;
            config.request_timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // WHY: stdout carries the sentences, so structured logs go to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!(?args, "Parsed CLI arguments");

    let mut config = match &args.config {
        Some(path) => AnnotatorConfig::load(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AnnotatorConfig::default(),
    };
    args.apply(&mut config);

    let splitter = SentenceSplitter::launch(config)
        .await
        .context("Failed to launch annotator")?;

    let outcome = run(&splitter, &args).await;
    splitter.shutdown().await;
    outcome
}

async fn run(splitter: &SentenceSplitter, args: &Args) -> Result<()> {
    if !args.text.is_empty() {
        let text = args.text.join(" ");
        let sentences = splitter.split_sentences(&text).await?;
        return emit(&sentences, args.json);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut inputs = 0u64;
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let sentences = splitter
            .split_sentences(&line)
            .await
            .with_context(|| format!("Failed to split input line {}", inputs + 1))?;
        emit(&sentences, args.json)?;
        inputs += 1;
    }
    info!("Split {} input lines", inputs);
    Ok(())
}

fn emit(sentences: &[String], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(sentences)?);
    } else {
        for sentence in sentences {
            println!("{sentence}");
        }
    }
    Ok(())
}
