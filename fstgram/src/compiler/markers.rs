//! Structured output words.
//!
//! Intents, tags, substitutions and slots are marked in the output of the
//! recognizer by pseudo-words. A marker is written as an XML-like tag, e.g.
//! `<slot name="color">`, then base64 encoded and prefixed with `__`, so that
//! it's a single token without whitespace.

use std::fmt::{
    self,
    Display,
};

use base64::{
    engine::general_purpose::STANDARD,
    Engine,
};
use nom::{
    branch::alt,
    bytes::complete::is_not,
    character::complete::{
        alpha1,
        char,
        space1,
    },
    combinator::{
        all_consuming,
        map,
        opt,
        recognize,
    },
    error::{
        context,
        VerboseError,
    },
    sequence::{
        delimited,
        pair,
        preceded,
        separated_pair,
    },
    IResult,
};

pub const MARKER_PREFIX: &str = "__";

type Res<'a, U> = IResult<&'a str, U, VerboseError<&'a str>>;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64 in marker: {word}")]
    Base64 {
        word: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("marker is not valid utf-8: {word}")]
    Utf8 {
        word: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("unknown marker: {text}")]
    Unknown { text: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    Intent { name: String },
    IntentEnd,
    Tag { name: String },
    TagEnd,
    Sub { value: String },
    SubEnd,
    Slot { name: String },
    SlotEnd,
}

impl Marker {
    /// The pseudo-word for this marker.
    pub fn encode(&self) -> String {
        format!("{MARKER_PREFIX}{}", STANDARD.encode(self.to_string()))
    }

    /// Decodes a word produced by [`Marker::encode`].
    ///
    /// Returns `Ok(None)` if the word isn't a marker at all.
    pub fn decode(word: &str) -> Result<Option<Self>, DecodeError> {
        let Some(encoded) = word.strip_prefix(MARKER_PREFIX)
        else {
            return Ok(None);
        };

        let bytes = STANDARD.decode(encoded).map_err(|source| {
            DecodeError::Base64 {
                word: word.to_owned(),
                source,
            }
        })?;
        let text = String::from_utf8(bytes).map_err(|source| {
            DecodeError::Utf8 {
                word: word.to_owned(),
                source,
            }
        })?;

        Self::parse(&text).map(Some)
    }

    /// Parses the XML-like form of a marker.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let unknown = || DecodeError::Unknown { text: text.to_owned() };

        let (_, (name, attribute)) = all_consuming(parse_element)(text).map_err(|_| unknown())?;
        let value = attribute.map(|(_, value)| unescape_attribute(value));

        let marker = match (name, attribute.map(|(key, _)| key), value) {
            ("intent", Some("name"), Some(name)) => Marker::Intent { name },
            ("/intent", None, _) => Marker::IntentEnd,
            ("tag", Some("name"), Some(name)) => Marker::Tag { name },
            ("/tag", None, _) => Marker::TagEnd,
            ("sub", Some("value"), Some(value)) => Marker::Sub { value },
            ("/sub", None, _) => Marker::SubEnd,
            ("slot", Some("name"), Some(name)) => Marker::Slot { name },
            ("/slot", None, _) => Marker::SlotEnd,
            _ => return Err(unknown()),
        };

        Ok(marker)
    }

    pub fn is_marker(word: &str) -> bool {
        word.starts_with(MARKER_PREFIX)
    }
}

impl Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Intent { name } => write!(f, "<intent name={}>", quote_attribute(name)),
            Marker::IntentEnd => write!(f, "</intent>"),
            Marker::Tag { name } => write!(f, "<tag name={}>", quote_attribute(name)),
            Marker::TagEnd => write!(f, "</tag>"),
            Marker::Sub { value } => write!(f, "<sub value={}>", quote_attribute(value)),
            Marker::SubEnd => write!(f, "</sub>"),
            Marker::Slot { name } => write!(f, "<slot name={}>", quote_attribute(name)),
            Marker::SlotEnd => write!(f, "</slot>"),
        }
    }
}

/// `<name key="value">` or `</name>`
fn parse_element(input: &str) -> Res<(&str, Option<(&str, &str)>)> {
    context(
        "element",
        delimited(
            char('<'),
            alt((
                map(recognize(preceded(char('/'), alpha1)), |name| {
                    (name, None::<(&str, &str)>)
                }),
                pair(alpha1, opt(preceded(space1, parse_attribute))),
            )),
            char('>'),
        ),
    )(input)
}

/// `key="value"` or `key='value'`
fn parse_attribute(input: &str) -> Res<(&str, &str)> {
    context(
        "attribute",
        separated_pair(
            alpha1,
            char('='),
            alt((
                delimited(char('"'), quoted_value("\""), char('"')),
                delimited(char('\''), quoted_value("'"), char('\'')),
            )),
        ),
    )(input)
}

fn quoted_value<'a>(quote: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    map(opt(is_not(quote)), Option::unwrap_or_default)
}

/// Quotes an attribute value like XML writers do. Double quotes are preferred,
/// single quotes are used if the value contains only double quotes.
pub fn quote_attribute(value: &str) -> String {
    let mut escaped = value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;");

    if escaped.contains('"') {
        if escaped.contains('\'') {
            escaped = escaped.replace('"', "&quot;");
        }
        else {
            return format!("'{escaped}'");
        }
    }

    format!("\"{escaped}\"")
}

fn unescape_attribute(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&#13;", "\r")
        .replace("&#9;", "\t")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
