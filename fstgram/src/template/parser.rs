use nom::{
    character::complete::{
        char,
        digit1,
    },
    combinator::{
        all_consuming,
        opt,
        recognize,
    },
    error::{
        context,
        VerboseError,
    },
    bytes::complete::tag,
    sequence::{
        pair,
        preceded,
        tuple,
    },
    IResult,
};

use super::{
    ast::{
        Expression,
        Number,
        NumberRange,
        Replacement,
        RuleReference,
        Sentence,
        Sequence,
        SequenceKind,
        SlotReference,
        Substitution,
        Tag,
        Word,
    },
    scanner::{
        next_chunk,
        Chunk,
        ChunkKind,
    },
    Error,
    ParseMetadata,
};

type Res<'a, U> = IResult<&'a str, U, VerboseError<&'a str>>;

/// `-12`
fn integer(input: &str) -> Res<&str> {
    context("integer", recognize(pair(opt(char('-')), digit1)))(input)
}

/// `1..10` or `0..100,5`
fn number_range(input: &str) -> Res<(&str, &str, Option<&str>)> {
    context(
        "number range",
        tuple((
            integer,
            preceded(tag(".."), integer),
            opt(preceded(char(','), digit1)),
        )),
    )(input)
}

fn match_number_range(text: &str) -> Option<(&str, &str, Option<&str>)> {
    all_consuming(number_range)(text)
        .ok()
        .map(|(_, range)| range)
}

fn match_number(text: &str) -> Option<&str> {
    all_consuming(integer)(text)
        .ok()
        .map(|(_, number)| number)
}

/// Whether a bare word with this text would be read as a number or a number
/// range.
pub(super) fn looks_numeric(text: &str) -> bool {
    match_number(text).is_some() || match_number_range(text).is_some()
}

fn parse_integer(text: &str, chunk: &Chunk, metadata: Option<&ParseMetadata>) -> Result<i64, Error> {
    text.parse().map_err(|_| {
        Error::Parse {
            reason: "number out of range",
            chunk: chunk.text.clone(),
            metadata: metadata.cloned(),
        }
    })
}

/// Parses a complete sentence template.
///
/// The text is parsed as if it was wrapped in a group. If the result is a
/// group that only holds another sequence, that sequence becomes the
/// sentence.
pub(super) fn parse_sentence(text: &str, metadata: Option<&ParseMetadata>) -> Result<Sentence, Error> {
    let wrapped = format!("({})", text.trim());

    let chunk = next_chunk(&wrapped, 0)
        .map_err(|error| Error::scan(error, metadata))?
        .filter(|chunk| chunk.kind == ChunkKind::Group && chunk.end == wrapped.len())
        .ok_or_else(|| {
            Error::Parse {
                reason: "unbalanced delimiters",
                chunk: text.to_owned(),
                metadata: metadata.cloned(),
            }
        })?;

    let Expression::Sequence(mut sequence) = parse_expression(&chunk, metadata)?
    else {
        return Err(Error::Parse {
            reason: "expected a group",
            chunk: text.to_owned(),
            metadata: metadata.cloned(),
        });
    };

    if sequence.items.len() == 1 && matches!(sequence.items[0], Expression::Sequence(_)) {
        if let Some(Expression::Sequence(inner)) = sequence.items.pop() {
            sequence = inner;
        }
    }

    Ok(Sentence(sequence))
}

/// Builds the expression for a single scanned chunk.
pub fn parse_expression(chunk: &Chunk, metadata: Option<&ParseMetadata>) -> Result<Expression, Error> {
    let expression = match chunk.kind {
        ChunkKind::Word => {
            let substitution = parse_substitution(chunk.substitution.as_deref());

            if let Some((lower, upper, step)) = match_number_range(&chunk.text) {
                NumberRange {
                    lower: parse_integer(lower, chunk, metadata)?,
                    upper: parse_integer(upper, chunk, metadata)?,
                    step: step
                        .map(|step| parse_integer(step, chunk, metadata))
                        .transpose()?
                        .unwrap_or(1),
                    substitution,
                    tag: None,
                }
                .into()
            }
            else if let Some(value) = match_number(&chunk.text) {
                Number {
                    value: parse_integer(value, chunk, metadata)?,
                    substitution,
                    tag: None,
                }
                .into()
            }
            else {
                Word {
                    substitution,
                    ..Word::new(chunk.text.as_str())
                }
                .into()
            }
        }
        ChunkKind::Quote => {
            Word {
                substitution: parse_substitution(chunk.substitution.as_deref()),
                ..Word::new(chunk.text.as_str())
            }
            .into()
        }
        ChunkKind::Group | ChunkKind::Optional => {
            let mut sequence = parse_sequence(&chunk.text, metadata)?;
            sequence.substitution = parse_substitution(chunk.substitution.as_deref());
            sequence.tag = chunk.tag.as_deref().map(|tag| Tag::new(tag.text.as_str()));

            if chunk.kind == ChunkKind::Optional {
                ensure_alternative(&mut sequence);
                sequence.items.push(Word::empty().into());
            }

            sequence.into()
        }
        ChunkKind::Slot => {
            SlotReference {
                slot_name: chunk.text.clone(),
                substitution: parse_substitution(chunk.substitution.as_deref()),
                tag: None,
            }
            .into()
        }
        ChunkKind::Rule => {
            let (intent_name, rule_name) = match chunk.text.split_once('.') {
                Some((intent_name, rule_name)) => (Some(intent_name.to_owned()), rule_name),
                None => {
                    (
                        metadata.and_then(|metadata| metadata.intent_name.clone()),
                        chunk.text.as_str(),
                    )
                }
            };

            if rule_name.is_empty() {
                return Err(Error::Parse {
                    reason: "empty rule name",
                    chunk: chunk.text.clone(),
                    metadata: metadata.cloned(),
                });
            }

            RuleReference {
                rule_name: rule_name.to_owned(),
                intent_name,
                tag: None,
            }
            .into()
        }
        ChunkKind::AlternativeSeparator => {
            return Err(Error::Parse {
                reason: "unexpected alternative separator",
                chunk: chunk.text.clone(),
                metadata: metadata.cloned(),
            });
        }
    };

    Ok(expression)
}

/// Parses the body of a group or optional.
fn parse_sequence(body: &str, metadata: Option<&ParseMetadata>) -> Result<Sequence, Error> {
    let mut sequence = Sequence::default();
    let mut remaining = body.trim_start();

    while let Some(chunk) = next_chunk(remaining, 0).map_err(|error| Error::scan(error, metadata))? {
        if chunk.end == 0 {
            return Err(Error::NoProgress {
                remaining: remaining.to_owned(),
                metadata: metadata.cloned(),
            });
        }

        if chunk.kind == ChunkKind::AlternativeSeparator {
            ensure_alternative(&mut sequence);
            sequence.items.push(Sequence::default().into());
        }
        else {
            let item = parse_expression(&chunk, metadata)?;

            match sequence.kind {
                SequenceKind::Group => sequence.items.push(item),
                SequenceKind::Alternative => {
                    let Some(Expression::Sequence(branch)) = sequence.items.last_mut()
                    else {
                        return Err(Error::Parse {
                            reason: "alternative without a branch",
                            chunk: chunk.text,
                            metadata: metadata.cloned(),
                        });
                    };
                    branch.items.push(item);
                }
            }
        }

        remaining = remaining[chunk.end..].trim_start();
    }

    if sequence.kind == SequenceKind::Alternative {
        // `a | b` should be an alternative of words, not of single word groups.
        for branch in &mut sequence.items {
            if let Expression::Sequence(group) = branch {
                if group.kind == SequenceKind::Group
                    && group.substitution.is_none()
                    && group.tag.is_none()
                    && group.items.len() == 1
                {
                    if let Some(item) = group.items.pop() {
                        *branch = item;
                    }
                }
            }
        }
    }

    Ok(sequence)
}

/// Turns a group into an alternative, moving the existing items into the
/// first branch.
fn ensure_alternative(sequence: &mut Sequence) {
    if sequence.kind != SequenceKind::Alternative {
        let items = std::mem::take(&mut sequence.items);
        sequence.kind = SequenceKind::Alternative;
        sequence.items.push(Sequence::group(items).into());
    }
}

fn parse_substitution(chunk: Option<&Chunk>) -> Option<Substitution> {
    let chunk = chunk?;

    let replacement = match chunk.kind {
        ChunkKind::Group => {
            Replacement::Words(chunk.text.split_whitespace().map(ToOwned::to_owned).collect())
        }
        _ => Replacement::Text(chunk.text.clone()),
    };

    Some(Substitution {
        replacement,
        converters: chunk.converters.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Sentence {
        Sentence::parse(text, None).unwrap()
    }

    fn word(text: &str) -> Expression {
        Word::new(text).into()
    }

    fn words(texts: &[&str]) -> Vec<Expression> {
        texts.iter().map(|text| word(text)).collect()
    }

    fn metadata(intent_name: &str) -> ParseMetadata {
        ParseMetadata {
            source_name: "test.ini".to_owned(),
            line_number: 1,
            intent_name: Some(intent_name.to_owned()),
        }
    }

    #[test]
    fn it_parses_words() {
        assert_eq!(
            parse("this is a test"),
            Sentence(Sequence::group(words(&["this", "is", "a", "test"])))
        );
    }

    #[test]
    fn it_ignores_surrounding_whitespace() {
        assert_eq!(parse("  this   is \t a test "), parse("this is a test"));
    }

    #[test]
    fn it_parses_nested_groups() {
        assert_eq!(
            parse("this (is a) test"),
            Sentence(Sequence::group(vec![
                word("this"),
                Sequence::group(words(&["is", "a"])).into(),
                word("test"),
            ]))
        );
    }

    #[test]
    fn it_parses_alternatives() {
        assert_eq!(
            parse("set color to (red | green | blue)"),
            Sentence(Sequence::group(vec![
                word("set"),
                word("color"),
                word("to"),
                Sequence::alternative(words(&["red", "green", "blue"])).into(),
            ]))
        );

        assert_eq!(
            parse("(a b | c)"),
            Sentence(Sequence::alternative(vec![
                Sequence::group(words(&["a", "b"])).into(),
                word("c"),
            ]))
        );
    }

    #[test]
    fn it_keeps_empty_branches() {
        assert_eq!(
            parse("(a | )"),
            Sentence(Sequence::alternative(vec![
                word("a"),
                Sequence::default().into(),
            ]))
        );
    }

    #[test]
    fn it_parses_optionals() {
        assert_eq!(
            parse("hello [world]"),
            Sentence(Sequence::group(vec![
                word("hello"),
                Sequence::alternative(vec![
                    Sequence::group(words(&["world"])).into(),
                    Word::empty().into(),
                ])
                .into(),
            ]))
        );

        assert_eq!(
            parse("[a | b]"),
            Sentence(Sequence::alternative(vec![
                word("a"),
                word("b"),
                Word::empty().into(),
            ]))
        );
    }

    #[test]
    fn it_unwraps_single_sequences() {
        let sentence = parse("(a b):c{d}");
        assert_eq!(sentence.items, words(&["a", "b"]));
        assert_eq!(sentence.substitution, Some(Substitution::text("c")));
        assert_eq!(sentence.tag, Some(Tag::new("d")));
    }

    #[test]
    fn it_parses_substitutions() {
        assert_eq!(
            parse("light:lamp").items,
            vec![Word {
                substitution: Some(Substitution::text("lamp")),
                ..Word::new("light")
            }
            .into()]
        );

        assert_eq!(
            parse("the:").items,
            vec![Word {
                substitution: Some(Substitution::text("")),
                ..Word::new("the")
            }
            .into()]
        );

        assert_eq!(
            parse("tv:(television set)").items,
            vec![Word {
                substitution: Some(Substitution {
                    replacement: Replacement::Words(vec![
                        "television".to_owned(),
                        "set".to_owned(),
                    ]),
                    converters: vec![],
                }),
                ..Word::new("tv")
            }
            .into()]
        );

        assert_eq!(
            parse("ten:10!int").items,
            vec![Word {
                substitution: Some(Substitution {
                    replacement: Replacement::Text("10".to_owned()),
                    converters: vec!["int".to_owned()],
                }),
                ..Word::new("ten")
            }
            .into()]
        );
    }

    #[test]
    fn it_parses_tags() {
        let sentence = parse("turn (on | off){state}");
        assert_eq!(
            sentence.items[1],
            Sequence {
                tag: Some(Tag::new("state")),
                ..Sequence::alternative(words(&["on", "off"]))
            }
            .into()
        );
    }

    #[test]
    fn it_parses_slot_references() {
        assert_eq!(
            parse("play $artist:band").items,
            vec![
                word("play"),
                SlotReference {
                    slot_name: "artist".to_owned(),
                    substitution: Some(Substitution::text("band")),
                    tag: None,
                }
                .into(),
            ]
        );
    }

    #[test]
    fn it_parses_rule_references() {
        let metadata = metadata("Lights");

        assert_eq!(
            Sentence::parse("<color>", Some(&metadata)).unwrap().items,
            vec![RuleReference {
                rule_name: "color".to_owned(),
                intent_name: Some("Lights".to_owned()),
                tag: None,
            }
            .into()]
        );

        assert_eq!(
            Sentence::parse("<Other.color>", Some(&metadata)).unwrap().items,
            vec![RuleReference {
                rule_name: "color".to_owned(),
                intent_name: Some("Other".to_owned()),
                tag: None,
            }
            .into()]
        );

        assert_eq!(
            parse("<color>").items,
            vec![RuleReference {
                rule_name: "color".to_owned(),
                intent_name: None,
                tag: None,
            }
            .into()]
        );
    }

    #[test]
    fn it_parses_numbers() {
        assert_eq!(
            parse("set to 75").items[2],
            Number {
                value: 75,
                substitution: None,
                tag: None,
            }
            .into()
        );

        assert_eq!(
            parse("-3").items,
            vec![Number {
                value: -3,
                substitution: None,
                tag: None,
            }
            .into()]
        );

        assert_eq!(
            parse("0..100,5").items,
            vec![NumberRange {
                lower: 0,
                upper: 100,
                step: 5,
                substitution: None,
                tag: None,
            }
            .into()]
        );

        assert_eq!(
            parse("-5..5").items,
            vec![NumberRange {
                lower: -5,
                upper: 5,
                step: 1,
                substitution: None,
                tag: None,
            }
            .into()]
        );

        // quoted numbers are words
        assert_eq!(parse("\"75\"").items, words(&["75"]));
        assert_eq!(parse("1.5").items, words(&["1.5"]));
    }

    #[test]
    fn it_fails_for_numbers_out_of_range() {
        assert!(matches!(
            Sentence::parse("99999999999999999999", None),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn it_parses_escapes() {
        assert_eq!(parse("a\\(b").items, words(&["a(b"]));
        assert_eq!(parse("\\[x\\]").items, words(&["[x]"]));
    }

    #[test]
    fn it_fails_for_unbalanced_delimiters() {
        assert!(matches!(Sentence::parse("(a b", None), Err(Error::Scan { .. })));
        assert!(matches!(
            Sentence::parse("a ] b", None),
            Err(Error::NoProgress { .. })
        ));
        assert!(matches!(
            Sentence::parse("a) (b", None),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn it_fails_for_tags_on_words() {
        assert!(matches!(
            Sentence::parse("word{tag}", None),
            Err(Error::Scan { .. })
        ));
    }

    #[test]
    fn it_reports_metadata() {
        let metadata = metadata("Lights");
        let error = Sentence::parse("(a b", Some(&metadata)).unwrap_err();
        assert!(error.to_string().contains("test.ini:1"));
    }
}
