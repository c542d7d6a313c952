// WHY: argv construction for the annotator process, kept apart from the protocol code
// Sessions can also be launched from any custom LaunchSpec (wrappers, test doubles)

use std::fmt;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::AnnotatorConfig;

/// Main class of the CoreNLP interactive shell
pub const CORENLP_MAIN: &str = "edu.stanford.nlp.pipeline.StanfordCoreNLP";

/// Program and arguments for one annotator process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Run through `sh` with `2>&1` so prompts written to stderr are seen
    pub merge_stderr: bool,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            merge_stderr: false,
        }
    }

    pub fn merge_stderr(mut self, merge: bool) -> Self {
        self.merge_stderr = merge;
        self
    }

    /// CoreNLP shell with JSON output and invertible tokenization
    pub fn corenlp(config: &AnnotatorConfig) -> Self {
        let mut args = vec![
            format!("-mx{}", config.memory),
            "-cp".to_string(),
            config.classpath.clone(),
            CORENLP_MAIN.to_string(),
        ];
        if let Some(properties) = &config.properties {
            args.push("-props".to_string());
            args.push(properties.clone());
        }
        args.push("-annotators".to_string());
        args.push(config.annotators.pipeline_arg());
        if !config.tokenize_options.is_empty() {
            args.push("-tokenize.options".to_string());
            args.push(config.tokenize_options.join(","));
        }
        args.extend(
            ["-outputFormat", "json", "-prettyPrint", "false"]
                .into_iter()
                .map(String::from),
        );

        Self {
            program: config.java.to_string_lossy().into_owned(),
            args,
            merge_stderr: config.merge_stderr,
        }
    }

    /// Command with piped stdin/stdout; the child is killed if the handle is dropped
    pub fn command(&self) -> Command {
        let mut command = if self.merge_stderr {
            let mut sh = Command::new("sh");
            sh.arg("-c")
                .arg("exec \"$@\" 2>&1")
                .arg("sh")
                .arg(&self.program)
                .args(&self.args);
            sh
        } else {
            let mut direct = Command::new(&self.program);
            direct.args(&self.args);
            direct
        };
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        if self.merge_stderr {
            write!(f, " 2>&1")?;
        }
        Ok(())
    }
}
