//! The sentence template language.
//!
//! A template describes a set of utterances, e.g.
//! `turn (on | off){state} [the] $light`. [`scanner`] splits template text
//! into chunks, and [`parser`] builds the [`ast`] from them.

pub mod ast;
mod parser;
pub mod scanner;

use std::fmt::{
    self,
    Display,
};

pub use self::{
    ast::{
        Expression,
        Sentence,
    },
    parser::parse_expression,
    scanner::{
        next_chunk,
        Chunk,
        ChunkKind,
        ScanError,
    },
};

/// Where a template came from, for error reporting and for resolving
/// unqualified rule references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseMetadata {
    pub source_name: String,
    pub line_number: usize,
    pub intent_name: Option<String>,
}

impl Display for ParseMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_name, self.line_number)?;
        if let Some(intent_name) = &self.intent_name {
            write!(f, " [{intent_name}]")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{}{error}", location(.metadata))]
    Scan {
        #[source]
        error: ScanError,
        metadata: Option<ParseMetadata>,
    },

    #[error("{}{reason}: {chunk}", location(.metadata))]
    Parse {
        reason: &'static str,
        chunk: String,
        metadata: Option<ParseMetadata>,
    },

    #[error("{}parser made no progress at: {remaining}", location(.metadata))]
    NoProgress {
        remaining: String,
        metadata: Option<ParseMetadata>,
    },
}

impl Error {
    fn scan(error: ScanError, metadata: Option<&ParseMetadata>) -> Self {
        Self::Scan {
            error,
            metadata: metadata.cloned(),
        }
    }

    pub fn metadata(&self) -> Option<&ParseMetadata> {
        match self {
            Error::Scan { metadata, .. }
            | Error::Parse { metadata, .. }
            | Error::NoProgress { metadata, .. } => metadata.as_ref(),
        }
    }
}

fn location(metadata: &Option<ParseMetadata>) -> String {
    metadata
        .as_ref()
        .map(|metadata| format!("{metadata}: "))
        .unwrap_or_default()
}

/// Parses a single sentence template.
pub fn parse_sentence(text: &str, metadata: Option<&ParseMetadata>) -> Result<Sentence, Error> {
    Sentence::parse(text, metadata)
}
