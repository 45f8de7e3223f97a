//! Sentence templates for speech recognition grammars.
//!
//! Sentences are written in a small template language, grouped by intent in
//! sentence files:
//!
//! ```ini
//! [SetLight]
//! colors = (red | green | blue){color}
//! set [the] light to <colors>
//! turn (on | off){state} the light
//! ```
//!
//! The [`compiler`] turns a [`Grammar`] into a finite-state acceptor in text
//! format, which a speech recognizer can use to restrict what it
//! recognizes. The recognizer's output can be turned back into text and
//! entities with the [`decode`] module.
//!
//! # Example
//!
//! ```
//! # use fstgram::{
//! #     compiler::{
//! #         compile,
//! #         slots::MemorySlotSource,
//! #     },
//! #     numbers::SpokenNumbers,
//! #     Grammar,
//! #     Error,
//! # };
//! # fn main() -> Result<(), Error> {
//! let grammar = Grammar::parse_str(
//!     "[SetLight]\nset the light to $color\n",
//!     "sentences.ini",
//! )?;
//! let slots = MemorySlotSource::default().with("color", "red\ngreen\nblue");
//!
//! let mut fst = vec![];
//! let compiled = compile(
//!     &grammar,
//!     &slots,
//!     &SpokenNumbers::default(),
//!     Default::default(),
//!     &mut fst,
//! )?;
//!
//! assert!(compiled.vocabulary.contains("green"));
//! assert!(compiled.used_slots.contains("color"));
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod decode;
pub mod document;
pub mod numbers;
pub mod template;
mod utils;

pub use crate::{
    document::Grammar,
    template::{
        ParseMetadata,
        Sentence,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("template error")]
    Template(#[from] template::Error),

    #[error("sentence file error")]
    Document(#[from] document::Error),

    #[error("compiler error")]
    Compiler(#[from] compiler::Error),

    #[error("number conversion error")]
    Numbers(#[from] numbers::Error),

    #[error("decode error")]
    Decode(#[from] decode::DecodeError),
}
