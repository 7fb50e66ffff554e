use anyhow::Context as _;
use std::{ffi::OsString, io::BufRead};

/// Where `--batch` input is read from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchSource {
    Stdin,
    File(std::path::PathBuf),
}

pub fn parse_batch_source(value: &str) -> Result<BatchSource, String> {
    if value == "-" {
        Ok(BatchSource::Stdin)
    } else if value.is_empty() {
        Err("--batch requires a filename or '-' for stdin".to_owned())
    } else {
        Ok(BatchSource::File(value.into()))
    }
}

impl BatchSource {
    pub fn open(&self) -> anyhow::Result<Box<dyn BufRead>> {
        Ok(match self {
            Self::Stdin => Box::new(std::io::BufReader::new(std::io::stdin())),
            Self::File(path) => Box::new(std::io::BufReader::new(
                std::fs::File::open(path)
                    .with_context(|| format!("unable to open {}", path.display()))?,
            )),
        })
    }
}

/// Splits each meaningful line of batch input into shell words, skipping
/// blank lines and `#` comments. Line numbers start at 1.
pub fn split_batch_lines(reader: impl BufRead) -> anyhow::Result<Vec<(usize, Vec<String>)>> {
    let mut lines = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let lineno = i + 1;
        let line = line.context("failed to read --batch input")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let words = shell_words::split(line).map_err(|e| {
            crate::error::UsageError(format!("error on line {lineno} of --batch input: {e}"))
        })?;
        lines.push((lineno, words));
    }

    Ok(lines)
}

/// Parses one batch line with a clap definition of its options and arguments
pub fn parse_batch_line<P: clap::Parser>(lineno: usize, words: &[String]) -> anyhow::Result<P> {
    let args = std::iter::once(OsString::from("--batch")).chain(words.iter().map(OsString::from));
    P::try_parse_from(args).map_err(|e| {
        let msg = e.to_string();
        let first = msg
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("error: ")
            .to_owned();
        crate::error::UsageError(format!("error on line {lineno} of --batch input: {first}"))
            .into()
    })
}
