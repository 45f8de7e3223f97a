//! Reader for the sectioned sentence file format.
//!
//! ```ini
//! [SetLight]
//! colors = (red | green | blue)
//! set the light to <colors>
//! ```
//!
//! A section header names an intent. Within a section, `key = value` lines
//! are entries with a value and every other line is an entry without one.
//! Blank lines and lines starting with `#` or `;` are skipped.
//!
//! A value continues on the following lines if they are indented deeper than
//! its entry, up to the next blank line:
//!
//! ```ini
//! [SetLight]
//! colors = red
//!     | green
//!     | blue
//! ```

use nom::{
    branch::alt,
    bytes::complete::take_till1,
    character::complete::{
        char,
        one_of,
    },
    combinator::{
        eof,
        map,
        rest,
        value,
    },
    error::{
        context,
        VerboseError,
    },
    sequence::{
        preceded,
        separated_pair,
    },
    IResult,
};

type Res<'a, U> = IResult<&'a str, U, VerboseError<&'a str>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub line_number: usize,
    pub entries: Vec<Entry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: Option<String>,
    pub line_number: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{source_name}:{line_number}: entry outside of a section: {line}")]
    MissingSection {
        source_name: String,
        line_number: usize,
        line: String,
    },

    #[error("{source_name}:{line_number}: malformed section header: {line}")]
    InvalidHeader {
        source_name: String,
        line_number: usize,
        line: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Comment,
    Header(&'a str),
    Entry { key: &'a str, value: Option<&'a str> },
}

fn parse_line(input: &str) -> Res<Line> {
    context(
        "line",
        alt((
            value(Line::Blank, eof),
            value(Line::Comment, preceded(one_of("#;"), rest)),
            map(preceded(char('['), rest), Line::Header),
            map(
                separated_pair(take_till1(|c: char| c == '='), char('='), rest),
                |(key, value)| {
                    Line::Entry {
                        key,
                        value: Some(value),
                    }
                },
            ),
            map(rest, |key| Line::Entry { key, value: None }),
        )),
    )(input)
}

/// Splits `text` into sections. Line numbers start at 1.
///
/// Sections with the same name are kept apart; merging them is up to the
/// caller.
pub fn parse_sections(text: &str, source_name: &str) -> Result<Vec<Section>, Error> {
    let mut sections: Vec<Section> = vec![];

    // indentation of the last entry, while its value can be continued
    let mut continued_indent = None;

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim();
        let indent = line.len() - line.trim_start().len();

        // the last branch accepts anything.
        let parsed = parse_line(trimmed).map_or(
            Line::Entry {
                key: trimmed,
                value: None,
            },
            |(_, parsed)| parsed,
        );

        match parsed {
            Line::Blank => continued_indent = None,
            Line::Comment => {}
            _ if continued_indent.is_some_and(|entry_indent| indent > entry_indent) => {
                let value = sections
                    .last_mut()
                    .and_then(|section| section.entries.last_mut())
                    .and_then(|entry| entry.value.as_mut());

                if let Some(value) = value {
                    tracing::trace!(line_number, "continued value");
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(trimmed);
                }
            }
            Line::Header(header) => {
                continued_indent = None;

                let Some(end) = header.rfind(']')
                else {
                    return Err(Error::InvalidHeader {
                        source_name: source_name.to_owned(),
                        line_number,
                        line: line.to_owned(),
                    });
                };

                let name = header[..end].trim();
                if name.is_empty() {
                    return Err(Error::InvalidHeader {
                        source_name: source_name.to_owned(),
                        line_number,
                        line: line.to_owned(),
                    });
                }

                tracing::trace!(line_number, name, "section");
                sections.push(Section {
                    name: name.to_owned(),
                    line_number,
                    entries: vec![],
                });
            }
            Line::Entry { key, value } => {
                let Some(section) = sections.last_mut()
                else {
                    return Err(Error::MissingSection {
                        source_name: source_name.to_owned(),
                        line_number,
                        line: line.to_owned(),
                    });
                };

                continued_indent = value.is_some().then_some(indent);
                section.entries.push(Entry {
                    key: key.trim().to_owned(),
                    value: value.map(|value| value.trim().to_owned()),
                    line_number,
                });
            }
        }
    }

    Ok(sections)
}
