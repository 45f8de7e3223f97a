use std::fmt::{
    self,
    Display,
    Write,
};

use itertools::Itertools;

use super::{
    parser,
    scanner::{
        ALTERNATIVE_SEPARATOR,
        CONVERTER_SEPARATOR,
        ESCAPE,
        GROUP_END,
        GROUP_START,
        OPTIONAL_END,
        OPTIONAL_START,
        QUOTE,
        RULE_END,
        RULE_START,
        SLOT_START,
        SUBSTITUTION_SEPARATOR,
        TAG_END,
        TAG_START,
    },
    Error,
    ParseMetadata,
};
use crate::utils::IsLast;

#[derive(Clone, Debug, PartialEq, Eq, derive_more::From)]
pub enum Expression {
    Word(Word),
    Sequence(Sequence),
    RuleReference(RuleReference),
    SlotReference(SlotReference),
    Number(Number),
    NumberRange(NumberRange),
}

impl Expression {
    pub fn substitution(&self) -> Option<&Substitution> {
        match self {
            Expression::Word(word) => word.substitution.as_ref(),
            Expression::Sequence(sequence) => sequence.substitution.as_ref(),
            Expression::RuleReference(_) => None,
            Expression::SlotReference(slot) => slot.substitution.as_ref(),
            Expression::Number(number) => number.substitution.as_ref(),
            Expression::NumberRange(range) => range.substitution.as_ref(),
        }
    }

    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Expression::Word(word) => word.tag.as_ref(),
            Expression::Sequence(sequence) => sequence.tag.as_ref(),
            Expression::RuleReference(rule) => rule.tag.as_ref(),
            Expression::SlotReference(slot) => slot.tag.as_ref(),
            Expression::Number(number) => number.tag.as_ref(),
            Expression::NumberRange(range) => range.tag.as_ref(),
        }
    }

    /// `true` for the empty word that makes an alternative optional.
    pub fn is_empty_word(&self) -> bool {
        matches!(self, Expression::Word(word) if word.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub substitution: Option<Substitution>,
    pub tag: Option<Tag>,
}

impl Word {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            substitution: None,
            tag: None,
        }
    }

    pub fn empty() -> Self {
        Self::new("")
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.substitution.is_none() && self.tag.is_none()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SequenceKind {
    /// Items are matched one after the other.
    #[default]
    Group,
    /// Exactly one item is matched.
    Alternative,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sequence {
    pub items: Vec<Expression>,
    pub kind: SequenceKind,
    pub substitution: Option<Substitution>,
    pub tag: Option<Tag>,
}

impl Sequence {
    pub fn group(items: Vec<Expression>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn alternative(items: Vec<Expression>) -> Self {
        Self {
            items,
            kind: SequenceKind::Alternative,
            ..Default::default()
        }
    }

    /// An optional is an alternative with an empty word as one branch.
    pub fn is_optional(&self) -> bool {
        self.kind == SequenceKind::Alternative && self.items.iter().any(Expression::is_empty_word)
    }

    /// A group without substitution or tag. Its items can be written without
    /// parentheses where the context allows it.
    fn is_plain_group(&self) -> bool {
        self.kind == SequenceKind::Group && self.substitution.is_none() && self.tag.is_none()
    }

    /// The branches to write between `[` and `]`, if this alternative reads
    /// back the same from that form. The trailing empty word is left out.
    fn optional_branches(&self) -> Option<&[Expression]> {
        let (last, branches) = self.items.split_last()?;
        if self.kind != SequenceKind::Alternative || !last.is_empty_word() {
            return None;
        }

        match branches {
            // `[a b]` is one group branch
            [Expression::Sequence(group)] if group.is_plain_group() => Some(branches),
            [] | [_] => None,
            // `[a | b]`, where an empty word would be one more branch
            _ => {
                branches
                    .iter()
                    .all(|branch| !branch.is_empty_word())
                    .then_some(branches)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleReference {
    pub rule_name: String,
    pub intent_name: Option<String>,
    pub tag: Option<Tag>,
}

impl RuleReference {
    /// The `<intent>.<rule>` name, resolving an unqualified reference against
    /// `current_intent`.
    pub fn qualified_name(&self, current_intent: Option<&str>) -> Option<String> {
        let intent_name = self.intent_name.as_deref().or(current_intent)?;
        Some(format!("{intent_name}.{}", self.rule_name))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotReference {
    pub slot_name: String,
    pub substitution: Option<Substitution>,
    pub tag: Option<Tag>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Number {
    pub value: i64,
    pub substitution: Option<Substitution>,
    pub tag: Option<Tag>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumberRange {
    pub lower: i64,
    pub upper: i64,
    pub step: i64,
    pub substitution: Option<Substitution>,
    pub tag: Option<Tag>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Replacement {
    /// A single word or a quoted phrase.
    Text(String),
    /// `:(several words)`
    Words(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Substitution {
    pub replacement: Replacement,
    /// Names of converters to apply to the value, in order.
    pub converters: Vec<String>,
}

impl Substitution {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            replacement: Replacement::Text(text.into()),
            converters: vec![],
        }
    }

    /// The replacement as it appears in the recognized text.
    pub fn value(&self) -> String {
        match &self.replacement {
            Replacement::Text(text) => text.clone(),
            Replacement::Words(words) => words.join(" "),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A complete template: one line of an intent, or the body of a rule.
#[derive(Clone, Debug, Default, PartialEq, Eq, derive_more::From, derive_more::Deref)]
pub struct Sentence(pub Sequence);

impl Sentence {
    pub fn parse(text: &str, metadata: Option<&ParseMetadata>) -> Result<Self, Error> {
        parser::parse_sentence(text, metadata)
    }
}

impl From<Sentence> for Expression {
    fn from(sentence: Sentence) -> Self {
        Expression::Sequence(sentence.0)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Word(word) => word.fmt(f),
            Expression::Sequence(sequence) => sequence.fmt(f),
            Expression::RuleReference(rule) => rule.fmt(f),
            Expression::SlotReference(slot) => slot.fmt(f),
            Expression::Number(number) => number.fmt(f),
            Expression::NumberRange(range) => range.fmt(f),
        }
    }
}

impl Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let needs_quotes = self.text.is_empty()
            || self.text.contains(char::is_whitespace)
            || parser::looks_numeric(&self.text);

        if needs_quotes {
            write_quoted(f, &self.text)?;
        }
        else {
            write_escaped(f, &self.text)?;
        }

        write_decorations(f, self.substitution.as_ref(), None)
    }
}

impl Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SequenceKind::Group => {
                f.write_char(GROUP_START)?;
                write!(f, "{}", self.items.iter().join(" "))?;
                f.write_char(GROUP_END)?;
            }
            SequenceKind::Alternative => {
                match self.optional_branches() {
                    Some([Expression::Sequence(group)]) => {
                        f.write_char(OPTIONAL_START)?;
                        write!(f, "{}", group.items.iter().join(" "))?;
                        f.write_char(OPTIONAL_END)?;
                    }
                    Some(branches) => {
                        f.write_char(OPTIONAL_START)?;
                        write_branches(f, branches)?;
                        f.write_char(OPTIONAL_END)?;
                    }
                    None => {
                        f.write_char(GROUP_START)?;
                        write_branches(f, &self.items)?;
                        f.write_char(GROUP_END)?;
                    }
                }
            }
        }

        write_decorations(f, self.substitution.as_ref(), self.tag.as_ref())
    }
}

impl Display for RuleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char(RULE_START)?;
        if let Some(intent_name) = &self.intent_name {
            write_escaped(f, intent_name)?;
            f.write_char('.')?;
        }
        write_escaped(f, &self.rule_name)?;
        f.write_char(RULE_END)
    }
}

impl Display for SlotReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char(SLOT_START)?;
        write_escaped(f, &self.slot_name)?;
        write_decorations(f, self.substitution.as_ref(), None)
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)?;
        write_decorations(f, self.substitution.as_ref(), None)
    }
}

impl Display for NumberRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lower, self.upper)?;
        if self.step != 1 {
            write!(f, ",{}", self.step)?;
        }
        write_decorations(f, self.substitution.as_ref(), None)
    }
}

impl Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char(SUBSTITUTION_SEPARATOR)?;

        match &self.replacement {
            Replacement::Text(text) if text.is_empty() => {}
            Replacement::Text(text) if text.contains(char::is_whitespace) => {
                write_quoted(f, text)?;
            }
            Replacement::Text(text) => write_escaped_replacement(f, text)?,
            Replacement::Words(words) => {
                f.write_char(GROUP_START)?;
                for (word, is_last) in IsLast::new(words.iter()) {
                    write_escaped(f, word)?;
                    if !is_last {
                        f.write_char(' ')?;
                    }
                }
                f.write_char(GROUP_END)?;
            }
        }

        for converter in &self.converters {
            f.write_char(CONVERTER_SEPARATOR)?;
            write_escaped_replacement(f, converter)?;
        }

        Ok(())
    }
}

impl Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // a single nested sequence would be unwrapped when read back
        let is_nested = matches!(self.0.items.as_slice(), [Expression::Sequence(_)]);

        if self.0.is_plain_group() && !is_nested {
            write!(f, "{}", self.0.items.iter().join(" "))
        }
        else {
            self.0.fmt(f)
        }
    }
}

/// Writes alternative branches separated by `|`.
///
/// A plain group branch is written without parentheses, unless it has a
/// single item, which would be unwrapped when read back.
fn write_branches(f: &mut fmt::Formatter<'_>, branches: &[Expression]) -> fmt::Result {
    for (branch, is_last) in IsLast::new(branches.iter()) {
        match branch {
            Expression::Sequence(group) if group.is_plain_group() && group.items.len() != 1 => {
                write!(f, "{}", group.items.iter().join(" "))?;
            }
            _ => branch.fmt(f)?,
        }
        if !is_last {
            write!(f, " {ALTERNATIVE_SEPARATOR} ")?;
        }
    }
    Ok(())
}

fn write_decorations(
    f: &mut fmt::Formatter<'_>,
    substitution: Option<&Substitution>,
    tag: Option<&Tag>,
) -> fmt::Result {
    if let Some(substitution) = substitution {
        substitution.fmt(f)?;
    }

    if let Some(tag) = tag {
        f.write_char(TAG_START)?;
        write_escaped(f, &tag.name)?;
        f.write_char(TAG_END)?;
    }

    Ok(())
}

fn is_reserved(c: char) -> bool {
    matches!(
        c,
        GROUP_START
            | GROUP_END
            | OPTIONAL_START
            | OPTIONAL_END
            | TAG_START
            | TAG_END
            | RULE_START
            | RULE_END
            | SUBSTITUTION_SEPARATOR
            | ALTERNATIVE_SEPARATOR
            | SLOT_START
            | QUOTE
            | ESCAPE
    )
}

fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    for c in text.chars() {
        if is_reserved(c) {
            f.write_char(ESCAPE)?;
        }
        f.write_char(c)?;
    }
    Ok(())
}

/// Like [`write_escaped`], but also escapes `!`, which would start a
/// converter name otherwise.
fn write_escaped_replacement(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    for c in text.chars() {
        if is_reserved(c) || c == CONVERTER_SEPARATOR {
            f.write_char(ESCAPE)?;
        }
        f.write_char(c)?;
    }
    Ok(())
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_char(QUOTE)?;
    for c in text.chars() {
        if c == QUOTE || c == ESCAPE {
            f.write_char(ESCAPE)?;
        }
        f.write_char(c)?;
    }
    f.write_char(QUOTE)
}
