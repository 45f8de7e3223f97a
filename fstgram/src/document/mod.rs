//! Intents, rules and the grammar that holds them.

pub mod sections;

use std::{
    collections::BTreeMap,
    path::{
        Path,
        PathBuf,
    },
};

use crate::template::{
    self,
    ParseMetadata,
    Sentence,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read sentences from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid sentence file")]
    Sections(#[from] sections::Error),

    #[error("invalid template")]
    Template(#[from] template::Error),
}

/// A named template that can be referenced with `<rule>` or
/// `<intent.rule>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub rule_name: String,
    pub intent_name: Option<String>,
    pub body: Sentence,
}

impl Rule {
    pub fn parse(
        rule_name: impl Into<String>,
        text: &str,
        metadata: Option<&ParseMetadata>,
    ) -> Result<Self, template::Error> {
        Ok(Self {
            rule_name: rule_name.into(),
            intent_name: metadata.and_then(|metadata| metadata.intent_name.clone()),
            body: Sentence::parse(text, metadata)?,
        })
    }

    /// `<intent>.<rule>`, or just the rule name if the rule belongs to no
    /// intent.
    pub fn qualified_name(&self) -> String {
        match &self.intent_name {
            Some(intent_name) => format!("{intent_name}.{}", self.rule_name),
            None => self.rule_name.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Intent {
    pub name: String,
    pub sentences: Vec<Sentence>,
    /// Rules local to this intent, by unqualified name.
    pub rules: BTreeMap<String, Rule>,
}

impl Intent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds a sentence, unless an equal one is already there.
    pub fn add_sentence(&mut self, sentence: Sentence) -> bool {
        if self.sentences.contains(&sentence) {
            tracing::warn!(intent = %self.name, %sentence, "skipping duplicate sentence");
            false
        }
        else {
            self.sentences.push(sentence);
            true
        }
    }
}

/// All intents of one compilation unit.
///
/// Intents are kept in the order they first appear in the sentence files,
/// which is the order they are compiled in. Rules are kept by qualified name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grammar {
    pub intents: Vec<Intent>,
    pub rules: BTreeMap<String, Rule>,
}

impl Grammar {
    pub fn parse_str(text: &str, source_name: &str) -> Result<Self, Error> {
        let mut grammar = Self::default();
        grammar.add_source(text, source_name)?;
        Ok(grammar)
    }

    pub fn from_files<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self, Error> {
        let mut grammar = Self::default();
        for path in paths {
            grammar.add_file(path)?;
        }
        Ok(grammar)
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "reading sentences");

        let text = std::fs::read_to_string(path).map_err(|source| {
            Error::Read {
                path: path.to_owned(),
                source,
            }
        })?;

        self.add_source(&text, &path.display().to_string())
    }

    /// Adds all intents of a sentence file. Intents that already exist are
    /// extended.
    pub fn add_source(&mut self, text: &str, source_name: &str) -> Result<(), Error> {
        for section in sections::parse_sections(text, source_name)? {
            let index = match self.intents.iter().position(|intent| intent.name == section.name) {
                Some(index) => index,
                None => {
                    self.intents.push(Intent::new(section.name.as_str()));
                    self.intents.len() - 1
                }
            };
            let intent = &mut self.intents[index];

            for entry in section.entries {
                let metadata = ParseMetadata {
                    source_name: source_name.to_owned(),
                    line_number: entry.line_number,
                    intent_name: Some(section.name.clone()),
                };

                match entry.value {
                    Some(body) => {
                        let rule = Rule::parse(entry.key, &body, Some(&metadata))?;
                        let qualified_name = rule.qualified_name();
                        tracing::trace!(rule = %qualified_name, body = %rule.body);

                        if intent.rules.insert(rule.rule_name.clone(), rule.clone()).is_some() {
                            tracing::warn!(rule = %qualified_name, %metadata, "rule redefined");
                        }
                        self.rules.insert(qualified_name, rule);
                    }
                    None => {
                        // a line starting with `[` would be read as a section header.
                        let text = match entry.key.strip_prefix("\\[") {
                            Some(rest) => format!("[{rest}"),
                            None => entry.key,
                        };

                        let sentence = Sentence::parse(&text, Some(&metadata))?;
                        tracing::trace!(intent = %section.name, %sentence);
                        intent.add_sentence(sentence);
                    }
                }
            }
        }

        Ok(())
    }

    pub fn intent(&self, name: &str) -> Option<&Intent> {
        self.intents.iter().find(|intent| intent.name == name)
    }

    pub fn rule(&self, qualified_name: &str) -> Option<&Rule> {
        self.rules.get(qualified_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::ast::{
        Expression,
        RuleReference,
        Sequence,
        Word,
    };

    fn words(texts: &[&str]) -> Sentence {
        Sentence(Sequence::group(
            texts.iter().map(|text| Word::new(*text).into()).collect(),
        ))
    }

    #[test]
    fn it_builds_intents_and_rules() {
        let text = "
[Intent1]
rule = a test
this is a <rule>

[Intent2]
rule = this is
<rule> <Intent1.rule>
";
        let grammar = Grammar::parse_str(text, "test.ini").unwrap();

        let rule1 = Rule {
            rule_name: "rule".to_owned(),
            intent_name: Some("Intent1".to_owned()),
            body: words(&["a", "test"]),
        };
        let rule2 = Rule {
            rule_name: "rule".to_owned(),
            intent_name: Some("Intent2".to_owned()),
            body: words(&["this", "is"]),
        };

        let reference = |intent_name: &str| -> Expression {
            RuleReference {
                rule_name: "rule".to_owned(),
                intent_name: Some(intent_name.to_owned()),
                tag: None,
            }
            .into()
        };

        assert_eq!(
            grammar.intent("Intent1").unwrap(),
            &Intent {
                name: "Intent1".to_owned(),
                sentences: vec![Sentence(Sequence::group(vec![
                    Word::new("this").into(),
                    Word::new("is").into(),
                    Word::new("a").into(),
                    reference("Intent1"),
                ]))],
                rules: [("rule".to_owned(), rule1.clone())].into(),
            }
        );

        assert_eq!(
            grammar.intent("Intent2").unwrap().sentences,
            vec![Sentence(Sequence::group(vec![
                reference("Intent2"),
                reference("Intent1"),
            ]))]
        );

        assert_eq!(grammar.rule("Intent1.rule"), Some(&rule1));
        assert_eq!(grammar.rule("Intent2.rule"), Some(&rule2));
        assert_eq!(grammar.rules.len(), 2);
    }

    #[test]
    fn it_unescapes_leading_brackets() {
        let grammar = Grammar::parse_str("[Intent]\n\\[this] is a test", "test.ini").unwrap();
        let sentence = &grammar.intent("Intent").unwrap().sentences[0];
        assert_eq!(sentence.to_string(), "[this] is a test");
    }

    #[test]
    fn it_skips_duplicate_sentences() {
        let grammar = Grammar::parse_str("[Intent]\nhello\nhello\nworld", "test.ini").unwrap();
        assert_eq!(
            grammar.intent("Intent").unwrap().sentences,
            vec![words(&["hello"]), words(&["world"])]
        );
    }

    #[test]
    fn it_merges_sources() {
        let mut grammar = Grammar::parse_str("[Intent]\nhello", "a.ini").unwrap();
        grammar.add_source("[Intent]\nworld\n[Other]\nfoo", "b.ini").unwrap();

        assert_eq!(grammar.intents.len(), 2);
        assert_eq!(grammar.intent("Intent").unwrap().sentences.len(), 2);
    }

    #[test]
    fn it_keeps_intents_in_file_order() {
        let mut grammar = Grammar::parse_str("[Zebra]
a
[Apple]
b
[Zebra]
c", "a.ini").unwrap();
        grammar.add_source("[Mango]
d
[Apple]
e", "b.ini").unwrap();

        let names = grammar
            .intents
            .iter()
            .map(|intent| intent.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["Zebra", "Apple", "Mango"]);
        assert_eq!(
            grammar.intent("Zebra").unwrap().sentences,
            vec![words(&["a"]), words(&["c"])]
        );
    }

    #[test]
    fn it_parses_continued_rule_bodies() {
        let grammar =
            Grammar::parse_str("[Intent]
color = red
    | green
set <color>", "test.ini").unwrap();
        assert_eq!(
            grammar.rule("Intent.color").unwrap().body.to_string(),
            "(red | green)"
        );
    }

    #[test]
    fn it_reports_template_errors_with_location() {
        let error = Grammar::parse_str("[Intent]\nhello\n(broken", "test.ini").unwrap_err();

        let Error::Template(error) = error
        else {
            panic!("unexpected error: {error:?}");
        };
        let metadata = error.metadata().unwrap();
        assert_eq!(metadata.source_name, "test.ini");
        assert_eq!(metadata.line_number, 3);
        assert_eq!(metadata.intent_name.as_deref(), Some("Intent"));
    }

    #[test]
    fn it_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentences.ini");
        std::fs::write(&path, "[Intent]\nhello world").unwrap();

        let grammar = Grammar::from_files([&path]).unwrap();
        assert_eq!(
            grammar.intent("Intent").unwrap().sentences,
            vec![words(&["hello", "world"])]
        );

        assert!(matches!(
            Grammar::from_files([dir.path().join("missing.ini")]),
            Err(Error::Read { .. })
        ));
    }
}
