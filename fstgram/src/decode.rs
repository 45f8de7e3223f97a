//! Decoding the output of a recognizer.
//!
//! A recognized line is the sequence of output words along the best path
//! through the acceptor, e.g. for `turn (on | off){state}`:
//!
//! ```text
//! __PGludGVudCBuYW1lPSJMaWdodCI+ turn __PHRhZyBuYW1lPSJzdGF0ZSI+ on __PC90YWc+ __PC9pbnRlbnQ+
//! ```

pub use crate::compiler::markers::DecodeError;
use crate::compiler::markers::Marker;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Marker(Marker),
}

/// Splits a line into words and decoded markers.
pub fn decode_tokens(line: &str) -> Result<Vec<Token>, DecodeError> {
    line.split_whitespace()
        .map(|word| {
            let token = match Marker::decode(word)? {
                Some(marker) => Token::Marker(marker),
                None => Token::Word(word.to_owned()),
            };
            Ok::<_, DecodeError>(token)
        })
        .collect()
}

/// Replaces markers with their XML-like form.
pub fn decode_line(line: &str) -> Result<String, DecodeError> {
    let words = decode_tokens(line)?
        .into_iter()
        .map(|token| {
            match token {
                Token::Word(word) => word,
                Token::Marker(marker) => marker.to_string(),
            }
        })
        .collect::<Vec<_>>();

    Ok(words.join(" "))
}

/// The recognized text with substitutions applied, without markers.
pub fn flatten_line(line: &str) -> Result<String, DecodeError> {
    Ok(Recognition::from_line(line)?.text)
}

/// Tagged part of a recognized line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    pub name: String,

    /// Text with substitutions applied.
    pub value: String,

    /// Text as it was spoken.
    pub raw_value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Recognition {
    pub intent: Option<String>,
    pub text: String,
    pub raw_text: String,
    pub entities: Vec<Entity>,
}

impl Recognition {
    pub fn from_line(line: &str) -> Result<Self, DecodeError> {
        Ok(Self::from_tokens(decode_tokens(line)?))
    }

    pub fn from_tokens(tokens: impl IntoIterator<Item = Token>) -> Self {
        let mut intent = None;
        let mut text = vec![];
        let mut raw_text = vec![];
        let mut entities = vec![];
        let mut open_tags = vec![];

        // words inside a substitution are replaced by its value
        let mut sub_depth = 0usize;

        for token in tokens {
            match token {
                Token::Word(word) => {
                    if sub_depth == 0 {
                        text.push(word.clone());
                    }
                    raw_text.push(word);
                }
                Token::Marker(Marker::Intent { name }) => {
                    if intent.is_none() {
                        intent = Some(name);
                    }
                }
                Token::Marker(Marker::Sub { value }) => {
                    if sub_depth == 0 && !value.is_empty() {
                        text.push(value);
                    }
                    sub_depth += 1;
                }
                Token::Marker(Marker::SubEnd) => {
                    sub_depth = sub_depth.saturating_sub(1);
                }
                Token::Marker(Marker::Tag { name }) => {
                    open_tags.push((name, text.len(), raw_text.len()));
                }
                Token::Marker(Marker::TagEnd) => {
                    let Some((name, text_start, raw_start)) = open_tags.pop()
                    else {
                        tracing::warn!("unbalanced tag end");
                        continue;
                    };

                    entities.push(Entity {
                        name,
                        value: text[text_start..].join(" "),
                        raw_value: raw_text[raw_start..].join(" "),
                    });
                }
                Token::Marker(Marker::IntentEnd | Marker::Slot { .. } | Marker::SlotEnd) => {}
            }
        }

        Self {
            intent,
            text: text.join(" "),
            raw_text: raw_text.join(" "),
            entities,
        }
    }
}
