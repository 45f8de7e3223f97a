//! Lexical scanner for sentence templates.
//!
//! The scanner looks at a single position in a template and returns the next
//! [`Chunk`], without consuming any leading whitespace. Callers advance by
//! slicing the text at [`Chunk::end`].
//!
//! Word-like chunks (words, quotes, slot and rule names, substitutions and
//! tags) have their backslash escapes removed. The body of a group or
//! optional is returned raw (escapes intact, delimiters stripped), because the
//! sequence parser scans it again.

pub const GROUP_START: char = '(';
pub const GROUP_END: char = ')';
pub const OPTIONAL_START: char = '[';
pub const OPTIONAL_END: char = ']';
pub const TAG_START: char = '{';
pub const TAG_END: char = '}';
pub const RULE_START: char = '<';
pub const RULE_END: char = '>';
pub const SUBSTITUTION_SEPARATOR: char = ':';
pub const ALTERNATIVE_SEPARATOR: char = '|';
pub const SLOT_START: char = '$';
pub const QUOTE: char = '"';
pub const ESCAPE: char = '\\';
/// Separates converter names from the replacement in a substitution.
pub const CONVERTER_SEPARATOR: char = '!';

/// Characters that close a delimited chunk.
const DELIMITER_ENDS: [char; 4] = [GROUP_END, OPTIONAL_END, TAG_END, RULE_END];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkKind {
    Word,
    Quote,
    Group,
    Optional,
    AlternativeSeparator,
    Slot,
    Rule,
}

/// One lexical unit of a template.
///
/// `start` and `end` are byte offsets into the text that was scanned. If a
/// substitution or tag is attached, `end` is the end of the last attached
/// chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub kind: ChunkKind,
    pub substitution: Option<Box<Chunk>>,
    pub tag: Option<Box<Chunk>>,
    /// Converter names of a substitution chunk.
    pub converters: Vec<String>,
}

impl Chunk {
    fn new(text: impl Into<String>, start: usize, end: usize, kind: ChunkKind) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            kind,
            substitution: None,
            tag: None,
            converters: vec![],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("unterminated '{open}' at {position}: {text}")]
    Unterminated {
        open: char,
        position: usize,
        text: String,
    },

    #[error("unexpected '{found}' at {position}: {text}")]
    Unexpected {
        found: char,
        position: usize,
        text: String,
    },

    #[error("missing name after '{prefix}' at {position}: {text}")]
    EmptyName {
        prefix: char,
        position: usize,
        text: String,
    },
}

/// Scans the chunk starting at byte offset `start` of `text`.
///
/// Returns `Ok(None)` at the end of the text or if `start` points at
/// whitespace.
pub fn next_chunk(text: &str, start: usize) -> Result<Option<Chunk>, ScanError> {
    let Some(c) = text[start..].chars().next()
    else {
        return Ok(None);
    };

    let chunk = match c {
        GROUP_START | OPTIONAL_START => {
            let (close, kind) = if c == GROUP_START {
                (GROUP_END, ChunkKind::Group)
            }
            else {
                (OPTIONAL_END, ChunkKind::Optional)
            };

            let end = find_end_delimiter(text, start + 1, c, close)
                .ok_or_else(|| unterminated(text, start, c))?;
            let mut chunk = Chunk::new(&text[start + 1..end - 1], start, end, kind);

            if let Some(substitution) = next_substitution(text, chunk.end)? {
                chunk.end = substitution.end;
                chunk.substitution = Some(Box::new(substitution));
            }

            if let Some(tag) = next_tag(text, chunk.end)? {
                chunk.end = tag.end;
                chunk.tag = Some(Box::new(tag));
            }

            chunk
        }
        ALTERNATIVE_SEPARATOR => {
            Chunk::new(
                ALTERNATIVE_SEPARATOR,
                start,
                start + 1,
                ChunkKind::AlternativeSeparator,
            )
        }
        RULE_START => {
            let end = find_end_delimiter(text, start + 1, RULE_START, RULE_END)
                .ok_or_else(|| unterminated(text, start, RULE_START))?;
            let name = remove_escapes(&text[start + 1..end - 1]);
            if name.is_empty() {
                return Err(empty_name(text, start, RULE_START));
            }
            Chunk::new(name, start, end, ChunkKind::Rule)
        }
        SLOT_START => {
            let end = find_end_word(text, start + 1);
            let name = remove_escapes(&text[start + 1..end]);
            if name.is_empty() {
                return Err(empty_name(text, start, SLOT_START));
            }
            let mut chunk = Chunk::new(name, start, end, ChunkKind::Slot);
            attach_substitution(text, &mut chunk)?;
            chunk
        }
        QUOTE => {
            let end = find_end_quote(text, start + 1)
                .ok_or_else(|| unterminated(text, start, QUOTE))?;
            let mut chunk = Chunk::new(
                remove_escapes(&text[start + 1..end - 1]),
                start,
                end,
                ChunkKind::Quote,
            );
            attach_substitution(text, &mut chunk)?;
            chunk
        }
        SUBSTITUTION_SEPARATOR | TAG_START => {
            return Err(ScanError::Unexpected {
                found: c,
                position: start,
                text: text[start..].to_owned(),
            });
        }
        c if c.is_whitespace() => return Ok(None),
        _ => {
            // a closing delimiter yields a zero-width word here, which the
            // sequence parser rejects.
            let end = find_end_word(text, start);
            let mut chunk = Chunk::new(
                remove_escapes(&text[start..end]),
                start,
                end,
                ChunkKind::Word,
            );
            attach_substitution(text, &mut chunk)?;
            chunk
        }
    };

    Ok(Some(chunk))
}

fn attach_substitution(text: &str, chunk: &mut Chunk) -> Result<(), ScanError> {
    if let Some(substitution) = next_substitution(text, chunk.end)? {
        chunk.end = substitution.end;
        chunk.substitution = Some(Box::new(substitution));
    }
    Ok(())
}

/// Scans a `:` substitution at `start`, if there is one.
///
/// The returned chunk starts at the `:`. Its kind tells how the replacement
/// was written: `Word` for a single word (or nothing at all), `Group` for
/// `(several words)` and `Quote` for `"a phrase"`.
fn next_substitution(text: &str, start: usize) -> Result<Option<Chunk>, ScanError> {
    if !text[start..].starts_with(SUBSTITUTION_SEPARATOR) {
        return Ok(None);
    }

    let sub_start = start + 1;
    let chunk = match text[sub_start..].chars().next() {
        None => Chunk::new("", start, sub_start, ChunkKind::Word),
        Some(c)
            if c.is_whitespace()
                || c == ALTERNATIVE_SEPARATOR
                || c == TAG_START
                || DELIMITER_ENDS.contains(&c) =>
        {
            // empty substitution: drop the text
            Chunk::new("", start, sub_start, ChunkKind::Word)
        }
        Some(GROUP_START) => {
            let end = find_end_delimiter(text, sub_start + 1, GROUP_START, GROUP_END)
                .ok_or_else(|| unterminated(text, sub_start, GROUP_START))?;
            let mut chunk = Chunk::new(
                remove_escapes(&text[sub_start + 1..end - 1]),
                start,
                end,
                ChunkKind::Group,
            );
            attach_converters(text, &mut chunk);
            chunk
        }
        Some(QUOTE) => {
            // converters only follow the closing quote
            let end = find_end_quote(text, sub_start + 1)
                .ok_or_else(|| unterminated(text, sub_start, QUOTE))?;
            let mut chunk = Chunk::new(
                remove_escapes(&text[sub_start + 1..end - 1]),
                start,
                end,
                ChunkKind::Quote,
            );
            attach_converters(text, &mut chunk);
            chunk
        }
        Some(c @ SUBSTITUTION_SEPARATOR) => {
            return Err(ScanError::Unexpected {
                found: c,
                position: sub_start,
                text: text[start..].to_owned(),
            });
        }
        Some(_) => {
            let end = find_end_word(text, sub_start);
            let (replacement, converters) = split_converters(&text[sub_start..end]);
            Chunk {
                converters,
                ..Chunk::new(replacement, start, end, ChunkKind::Word)
            }
        }
    };

    Ok(Some(chunk))
}

/// Scans `!name` converters directly following a substitution chunk.
fn attach_converters(text: &str, chunk: &mut Chunk) {
    if text[chunk.end..].starts_with(CONVERTER_SEPARATOR) {
        let end = find_end_word(text, chunk.end);
        let (_, converters) = split_converters(&text[chunk.end..end]);
        chunk.converters = converters;
        chunk.end = end;
    }
}

/// Splits raw substitution text on unescaped `!`. Returns the unescaped
/// replacement and the non-empty converter names.
fn split_converters(raw: &str) -> (String, Vec<String>) {
    let mut parts = vec![];
    let mut part_start = 0;
    let mut is_escaped = false;

    for (i, c) in raw.char_indices() {
        if is_escaped {
            is_escaped = false;
        }
        else if c == ESCAPE {
            is_escaped = true;
        }
        else if c == CONVERTER_SEPARATOR {
            parts.push(&raw[part_start..i]);
            part_start = i + c.len_utf8();
        }
    }
    parts.push(&raw[part_start..]);

    let replacement = remove_escapes(parts[0]);
    let converters = parts[1..]
        .iter()
        .filter(|part| !part.is_empty())
        .map(|part| remove_escapes(part))
        .collect();

    (replacement, converters)
}

/// Scans a `{tag}` at `start`, if there is one.
fn next_tag(text: &str, start: usize) -> Result<Option<Chunk>, ScanError> {
    if !text[start..].starts_with(TAG_START) {
        return Ok(None);
    }

    let end = find_end_delimiter(text, start + 1, TAG_START, TAG_END)
        .ok_or_else(|| unterminated(text, start, TAG_START))?;

    Ok(Some(Chunk::new(
        remove_escapes(&text[start + 1..end - 1]),
        start,
        end,
        ChunkKind::Word,
    )))
}

/// Finds the end of a delimited chunk whose body starts at `start`.
///
/// Returns the offset just past the matching `close`. Only `open` and
/// `close` are counted, escaped characters never are.
fn find_end_delimiter(text: &str, start: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 1usize;
    let mut is_escaped = false;

    for (i, c) in text[start..].char_indices() {
        if is_escaped {
            is_escaped = false;
            continue;
        }

        if c == ESCAPE {
            is_escaped = true;
        }
        else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(start + i + c.len_utf8());
            }
        }
        else if c == open {
            depth += 1;
        }
    }

    None
}

/// Finds the end of a bare word starting at `start`. This may be `start`
/// itself.
fn find_end_word(text: &str, start: usize) -> usize {
    let mut is_escaped = false;

    for (i, c) in text[start..].char_indices() {
        if is_escaped {
            is_escaped = false;
            continue;
        }

        if c == ESCAPE {
            is_escaped = true;
            continue;
        }

        if c.is_whitespace()
            || c == SUBSTITUTION_SEPARATOR
            || c == TAG_START
            || c == ALTERNATIVE_SEPARATOR
            || DELIMITER_ENDS.contains(&c)
        {
            return start + i;
        }
    }

    text.len()
}

/// Finds the end of a quoted word whose body starts at `start`.
fn find_end_quote(text: &str, start: usize) -> Option<usize> {
    let mut is_escaped = false;

    for (i, c) in text[start..].char_indices() {
        if is_escaped {
            is_escaped = false;
            continue;
        }

        if c == ESCAPE {
            is_escaped = true;
        }
        else if c == QUOTE {
            return Some(start + i + 1);
        }
    }

    None
}

/// Removes backslash escapes. A trailing lone backslash is kept.
pub fn remove_escapes(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c == ESCAPE {
            match chars.next() {
                Some(escaped) => output.push(escaped),
                None => output.push(c),
            }
        }
        else {
            output.push(c);
        }
    }

    output
}

fn unterminated(text: &str, start: usize, open: char) -> ScanError {
    ScanError::Unterminated {
        open,
        position: start,
        text: text[start..].to_owned(),
    }
}

fn empty_name(text: &str, start: usize, prefix: char) -> ScanError {
    ScanError::EmptyName {
        prefix,
        position: start,
        text: text[start..].to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        next_chunk(text, 0).unwrap().unwrap()
    }

    fn sub(text: &str, start: usize, end: usize, kind: ChunkKind) -> Option<Box<Chunk>> {
        Some(Box::new(Chunk::new(text, start, end, kind)))
    }

    #[test]
    fn it_scans_words() {
        assert_eq!(chunk("test"), Chunk::new("test", 0, 4, ChunkKind::Word));
        assert_eq!(chunk("test more"), Chunk::new("test", 0, 4, ChunkKind::Word));
        assert_eq!(chunk("a|b"), Chunk::new("a", 0, 1, ChunkKind::Word));
    }

    #[test]
    fn it_scans_word_substitutions() {
        let text = "test:test2";
        assert_eq!(
            chunk(text),
            Chunk {
                substitution: sub("test2", 4, text.len(), ChunkKind::Word),
                ..Chunk::new("test", 0, text.len(), ChunkKind::Word)
            }
        );

        let text = "test:";
        assert_eq!(
            chunk(text),
            Chunk {
                substitution: sub("", 4, text.len(), ChunkKind::Word),
                ..Chunk::new("test", 0, text.len(), ChunkKind::Word)
            }
        );

        let text = "test:(test2 test3)";
        assert_eq!(
            chunk(text),
            Chunk {
                substitution: sub("test2 test3", 4, text.len(), ChunkKind::Group),
                ..Chunk::new("test", 0, text.len(), ChunkKind::Word)
            }
        );

        let text = "test:\"a phrase\"";
        assert_eq!(
            chunk(text),
            Chunk {
                substitution: sub("a phrase", 4, text.len(), ChunkKind::Quote),
                ..Chunk::new("test", 0, text.len(), ChunkKind::Word)
            }
        );
    }

    #[test]
    fn it_removes_escapes() {
        let text = "test\\(2\\)";
        assert_eq!(chunk(text), Chunk::new("test(2)", 0, text.len(), ChunkKind::Word));

        let text = "test:test\\(2\\)";
        assert_eq!(
            chunk(text),
            Chunk {
                substitution: sub("test(2)", 4, text.len(), ChunkKind::Word),
                ..Chunk::new("test", 0, text.len(), ChunkKind::Word)
            }
        );

        let text = "\\$test";
        assert_eq!(chunk(text), Chunk::new("$test", 0, text.len(), ChunkKind::Word));

        let text = "\\<test\\>";
        assert_eq!(chunk(text), Chunk::new("<test>", 0, text.len(), ChunkKind::Word));
    }

    #[test]
    fn it_scans_quotes() {
        let text = "\"test(2)\"";
        assert_eq!(chunk(text), Chunk::new("test(2)", 0, text.len(), ChunkKind::Quote));

        let text = "\"test\\\"2\\\"\"";
        assert_eq!(chunk(text), Chunk::new("test\"2\"", 0, text.len(), ChunkKind::Quote));
    }

    #[test]
    fn it_scans_groups_and_optionals() {
        let text = "(test test2)";
        assert_eq!(chunk(text), Chunk::new("test test2", 0, text.len(), ChunkKind::Group));

        let text = "[test test2]";
        assert_eq!(
            chunk(text),
            Chunk::new("test test2", 0, text.len(), ChunkKind::Optional)
        );

        let text = "(a (b) c) d";
        assert_eq!(chunk(text), Chunk::new("a (b) c", 0, 9, ChunkKind::Group));

        // escapes are kept in group bodies
        let text = "(a\\) b)";
        assert_eq!(chunk(text), Chunk::new("a\\) b", 0, text.len(), ChunkKind::Group));
    }

    #[test]
    fn it_scans_group_substitutions_and_tags() {
        let text = "(test test2):(test3 test4)";
        assert_eq!(
            chunk(text),
            Chunk {
                substitution: sub("test3 test4", 12, text.len(), ChunkKind::Group),
                ..Chunk::new("test test2", 0, text.len(), ChunkKind::Group)
            }
        );

        let text = "[test test2]:";
        assert_eq!(
            chunk(text),
            Chunk {
                substitution: sub("", 12, text.len(), ChunkKind::Word),
                ..Chunk::new("test test2", 0, text.len(), ChunkKind::Optional)
            }
        );

        let text = "(test test2){test3}";
        assert_eq!(
            chunk(text),
            Chunk {
                tag: sub("test3", 12, text.len(), ChunkKind::Word),
                ..Chunk::new("test test2", 0, text.len(), ChunkKind::Group)
            }
        );

        let text = "(a):b{c}";
        assert_eq!(
            chunk(text),
            Chunk {
                substitution: sub("b", 3, 5, ChunkKind::Word),
                tag: sub("c", 5, text.len(), ChunkKind::Word),
                ..Chunk::new("a", 0, text.len(), ChunkKind::Group)
            }
        );
    }

    #[test]
    fn it_scans_references() {
        assert_eq!(chunk("$test"), Chunk::new("test", 0, 5, ChunkKind::Slot));
        assert_eq!(chunk("$a/b c"), Chunk::new("a/b", 0, 4, ChunkKind::Slot));
        assert_eq!(
            chunk("$test:other"),
            Chunk {
                substitution: sub("other", 5, 11, ChunkKind::Word),
                ..Chunk::new("test", 0, 11, ChunkKind::Slot)
            }
        );
        assert_eq!(chunk("<test>"), Chunk::new("test", 0, 6, ChunkKind::Rule));
        assert_eq!(
            chunk("<intent.rule>"),
            Chunk::new("intent.rule", 0, 13, ChunkKind::Rule)
        );
        assert_eq!(chunk("|"), Chunk::new("|", 0, 1, ChunkKind::AlternativeSeparator));
    }

    #[test]
    fn it_scans_at_an_offset() {
        let text = "hello (big world)";
        let first = chunk(text);
        assert_eq!(first.end, 5);
        assert_eq!(next_chunk(text, first.end).unwrap(), None);
        assert_eq!(
            next_chunk(text, 6).unwrap().unwrap(),
            Chunk::new("big world", 6, text.len(), ChunkKind::Group)
        );
    }

    #[test]
    fn it_fails_for_unterminated_delimiters() {
        assert!(matches!(
            next_chunk("(a b", 0),
            Err(ScanError::Unterminated { open: '(', .. })
        ));
        assert!(matches!(
            next_chunk("[a (b]", 0),
            Err(ScanError::Unterminated { open: '[', .. })
        ));
        assert!(matches!(
            next_chunk("\"a b", 0),
            Err(ScanError::Unterminated { open: '"', .. })
        ));
        assert!(matches!(
            next_chunk("(a){b", 0),
            Err(ScanError::Unterminated { open: '{', .. })
        ));
        assert!(matches!(
            next_chunk("(a\\)", 0),
            Err(ScanError::Unterminated { .. })
        ));
    }

    #[test]
    fn it_fails_for_unexpected_characters() {
        assert!(matches!(
            next_chunk(":a", 0),
            Err(ScanError::Unexpected { found: ':', .. })
        ));
        assert!(matches!(
            next_chunk("{a}", 0),
            Err(ScanError::Unexpected { found: '{', .. })
        ));
        assert!(matches!(next_chunk("$", 0), Err(ScanError::EmptyName { .. })));
        assert!(matches!(next_chunk("<>", 0), Err(ScanError::EmptyName { .. })));
    }

    #[test]
    fn it_returns_zero_width_words_for_stray_closers() {
        assert_eq!(chunk("] b"), Chunk::new("", 0, 0, ChunkKind::Word));
    }

    #[test]
    fn it_scans_converters() {
        let text = "ten:10!int!double";
        assert_eq!(
            chunk(text),
            Chunk {
                substitution: Some(Box::new(Chunk {
                    converters: vec!["int".to_owned(), "double".to_owned()],
                    ..Chunk::new("10", 3, text.len(), ChunkKind::Word)
                })),
                ..Chunk::new("ten", 0, text.len(), ChunkKind::Word)
            }
        );

        let text = "x:(a b)!upper";
        let substitution = chunk(text).substitution.unwrap();
        assert_eq!(substitution.text, "a b");
        assert_eq!(substitution.converters, ["upper"]);
        assert_eq!(substitution.end, text.len());
    }

    #[test]
    fn it_keeps_escaped_and_quoted_exclamation_marks() {
        let substitution = chunk("x:wow\\!").substitution.unwrap();
        assert_eq!(substitution.text, "wow!");
        assert!(substitution.converters.is_empty());

        let substitution = chunk("x:\"a!b c\"").substitution.unwrap();
        assert_eq!(substitution.text, "a!b c");
        assert!(substitution.converters.is_empty());

        let substitution = chunk("x:\"wow!\"!int").substitution.unwrap();
        assert_eq!(substitution.text, "wow!");
        assert_eq!(substitution.converters, ["int"]);
    }

    #[test]
    fn it_does_not_tag_words() {
        // tags only attach to groups and optionals
        assert_eq!(chunk("word{tag}"), Chunk::new("word", 0, 4, ChunkKind::Word));
    }
}
