//! Sources of subject turns.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

/// Where subject turns come from
#[async_trait]
pub trait SubjectInput: Send {
    /// Next subject turn, or `None` once the input is closed
    async fn read_next(&mut self) -> Result<Option<String>>;
}

/// Reads one turn per line from stdin
pub struct ConsoleInput {
    lines: Lines<BufReader<Stdin>>,
    prompt: String,
}

impl ConsoleInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            prompt: "👤 You: ".to_string(),
        }
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubjectInput for ConsoleInput {
    async fn read_next(&mut self) -> Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(self.prompt.as_bytes()).await?;
        stdout.flush().await?;

        self.lines
            .next_line()
            .await
            .context("Failed to read from stdin")
    }
}

/// Replays a fixed list of turns
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    turns: VecDeque<String>,
    echo: bool,
}

impl ScriptedInput {
    pub fn new<I, S>(turns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            turns: turns.into_iter().map(Into::into).collect(),
            echo: false,
        }
    }

    /// Print each turn as it is replayed
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// One turn per line; blank lines and `#` comments are skipped
    pub fn parse(content: &str) -> Self {
        Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        )
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read script: {:?}", path))?;
        Ok(Self::parse(&content))
    }

    pub fn remaining(&self) -> usize {
        self.turns.len()
    }
}

#[async_trait]
impl SubjectInput for ScriptedInput {
    async fn read_next(&mut self) -> Result<Option<String>> {
        let turn = self.turns.pop_front();
        if self.echo
            && let Some(turn) = &turn
        {
            println!("👤 You: {}", turn);
        }
        Ok(turn)
    }
}
