//! Compiles a [`Grammar`] into a finite-state acceptor.
//!
//! The acceptor starts in a single state, branches into one sub-graph per
//! intent and ends in a single final state. Every path through it is an
//! utterance of the grammar. Its output labels are the recognized words,
//! interleaved with [markers](markers::Marker) for intents, tags,
//! substitutions and slots.
//!
//! Slots, rule references and number ranges are all compiled the same way:
//! as a slot whose values are a list of sentences. For rules and number
//! ranges, these are pseudo-slots named `_rule/<intent>.<rule>` and
//! `_number/<lower>,<upper>,<step>,<language>`.

mod emit;
pub mod fst;
pub mod markers;
mod preprocess;
pub mod slots;

use std::{
    collections::{
        BTreeSet,
        HashMap,
    },
    io::Write,
    path::PathBuf,
    rc::Rc,
};

use derivative::Derivative;

use self::{
    emit::Compile,
    fst::{
        FstWriter,
        StateCounter,
        StateId,
    },
    markers::Marker,
    slots::SlotSource,
};
use crate::{
    document::Grammar,
    numbers::{
        self,
        NumberToWords,
    },
    template::{
        self,
        ast::{
            Expression,
            NumberRange,
            Sentence,
            Sequence,
            Substitution,
            Word,
        },
        ParseMetadata,
    },
};

pub const DEFAULT_EPS: &str = "<eps>";
pub const DEFAULT_NUMBER_LANGUAGE: &str = "en";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid compiler parameters")]
    Check(#[from] CheckError),

    #[error("rule '{0}' is undefined")]
    UnknownRule(String),

    #[error("rule reference '<{0}>' has no intent to resolve against")]
    UnresolvedRule(String),

    #[error("slot '{0}' is undefined")]
    UnknownSlot(String),

    #[error("failed to read values of slot '{slot_name}' from {path}")]
    SlotRead {
        slot_name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid number range {lower}..{upper},{step}: {reason}")]
    InvalidRange {
        lower: i64,
        upper: i64,
        step: i64,
        reason: &'static str,
    },

    #[error("'{0}' expands into itself")]
    Recursive(String),

    #[error("invalid slot value")]
    Template(#[from] template::Error),

    #[error("number conversion failed")]
    Numbers(#[from] numbers::Error),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Parameters for a compilation run.
#[derive(Clone, Debug)]
pub struct CompilerParameters {
    /// Label for epsilon transitions.
    pub eps: String,

    /// Language passed to the number converter.
    pub number_language: String,

    /// Weight written for every arc.
    pub weight: f64,

    /// If set, the values of every slot, rule and number range used by the
    /// grammar are written to `<dir>/<name>/values.txt`.
    pub slots_output_dir: Option<PathBuf>,
}

impl Default for CompilerParameters {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS.to_owned(),
            number_language: DEFAULT_NUMBER_LANGUAGE.to_owned(),
            weight: 0.0,
            slots_output_dir: None,
        }
    }
}

/// Error returned by [`CompilerParameters::check`]
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("invalid epsilon label: '{0}'")]
    Eps(String),

    #[error("number language is empty")]
    NumberLanguage,

    #[error("invalid weight: {0}")]
    Weight(f64),
}

impl CompilerParameters {
    pub fn check(&self) -> Result<(), CheckError> {
        if self.eps.is_empty() || self.eps.contains(char::is_whitespace) {
            return Err(CheckError::Eps(self.eps.clone()));
        }

        if self.number_language.is_empty() {
            return Err(CheckError::NumberLanguage);
        }

        if !self.weight.is_finite() {
            return Err(CheckError::Weight(self.weight));
        }

        Ok(())
    }
}

/// The result of compiling a grammar.
///
/// The vocabulary and output words are needed to build the lexicon for the
/// acceptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Compiled {
    pub start_state: StateId,
    pub final_state: StateId,
    pub num_states: u64,
    pub num_arcs: usize,

    /// Input words of the acceptor.
    pub vocabulary: BTreeSet<String>,

    /// Output words that aren't input words: markers and number values.
    pub output_words: BTreeSet<String>,

    /// Signatures of all slots, rules and number ranges that were expanded.
    pub used_slots: BTreeSet<String>,
}

/// Writes one word per line.
pub fn write_words<'w>(
    mut writer: impl Write,
    words: impl IntoIterator<Item = &'w String>,
) -> Result<(), std::io::Error> {
    for word in words {
        writeln!(writer, "{word}")?;
    }
    writer.flush()
}

/// What a slot, rule or number range expands into.
#[derive(Debug)]
struct Expansion {
    sentences: Vec<Sentence>,

    /// The text written to the slot output directory.
    contents: String,

    /// Intent that unqualified rule references in the sentences resolve
    /// against. If not set, the referencing intent is used.
    intent_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SlotKey {
    Slot(String),
    Rule(String),
    Range { lower: i64, upper: i64, step: i64 },
}

impl SlotKey {
    fn range(range: &NumberRange) -> Result<Self, Error> {
        let invalid = |reason| {
            Error::InvalidRange {
                lower: range.lower,
                upper: range.upper,
                step: range.step,
                reason,
            }
        };

        if range.step <= 0 {
            return Err(invalid("step must be positive"));
        }

        if range.lower > range.upper {
            return Err(invalid("lower bound is greater than upper bound"));
        }

        Ok(Self::Range {
            lower: range.lower,
            upper: range.upper,
            step: range.step,
        })
    }

    fn signature(&self, language: &str) -> String {
        match self {
            SlotKey::Slot(slot_name) => slot_name.clone(),
            SlotKey::Rule(qualified_name) => format!("_rule/{qualified_name}"),
            SlotKey::Range { lower, upper, step } => {
                format!("_number/{lower},{upper},{step},{language}")
            }
        }
    }
}

/// State of one compilation run.
#[derive(Debug, Default)]
pub struct CompilerContext {
    states: StateCounter,
    vocabulary: BTreeSet<String>,
    output_words: BTreeSet<String>,

    /// Signatures that were preprocessed.
    used_slots: BTreeSet<String>,

    /// Expansions by signature.
    expansions: HashMap<String, Rc<Expansion>>,

    /// Signatures that are being emitted right now.
    active: Vec<String>,
}

impl CompilerContext {
    pub fn vocabulary(&self) -> &BTreeSet<String> {
        &self.vocabulary
    }

    pub fn output_words(&self) -> &BTreeSet<String> {
        &self.output_words
    }

    pub fn used_slots(&self) -> &BTreeSet<String> {
        &self.used_slots
    }

    pub fn num_states(&self) -> u64 {
        self.states.count()
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Compiler<'a> {
    grammar: &'a Grammar,

    #[derivative(Debug = "ignore")]
    slots: &'a dyn SlotSource,

    #[derivative(Debug = "ignore")]
    numbers: &'a dyn NumberToWords,

    parameters: CompilerParameters,

    context: CompilerContext,
}

impl<'a> Compiler<'a> {
    pub fn new(
        grammar: &'a Grammar,
        slots: &'a dyn SlotSource,
        numbers: &'a dyn NumberToWords,
        parameters: CompilerParameters,
    ) -> Result<Self, Error> {
        parameters.check()?;

        Ok(Self {
            grammar,
            slots,
            numbers,
            parameters,
            context: CompilerContext::default(),
        })
    }

    pub fn parameters(&self) -> &CompilerParameters {
        &self.parameters
    }

    pub fn context(&self) -> &CompilerContext {
        &self.context
    }

    /// Compiles the whole grammar and writes the acceptor to `writer`.
    pub fn compile_grammar<W: Write>(mut self, writer: W) -> Result<Compiled, Error> {
        tracing::info!(
            intents = self.grammar.intents.len(),
            rules = self.grammar.rules.len(),
            "compiling grammar"
        );

        self.preprocess()?;

        let mut fst = FstWriter::new(writer, self.parameters.eps.as_str(), self.parameters.weight);

        let start_state = self.new_state();
        let end_state = self.new_state();

        let grammar = self.grammar;
        for intent in &grammar.intents {
            tracing::debug!(
                intent = %intent.name,
                sentences = intent.sentences.len(),
                "compiling intent"
            );

            let intent_state = self.new_state();
            let marker = self.marker(Marker::Intent {
                name: intent.name.clone(),
            });
            fst.epsilon_arc(start_state, intent_state, Some(&marker))?;

            for sentence in &intent.sentences {
                let sentence_end =
                    sentence.compile(&mut self, &mut fst, Some(&intent.name), intent_state)?;
                let marker = self.marker(Marker::IntentEnd);
                fst.epsilon_arc(sentence_end, end_state, Some(&marker))?;
            }
        }

        let final_state = self.new_state();
        fst.epsilon_arc(end_state, final_state, None)?;
        fst.final_state(final_state)?;
        fst.flush()?;

        let num_arcs = fst.num_arcs();
        tracing::info!(
            states = self.context.num_states(),
            arcs = num_arcs,
            words = self.context.vocabulary.len(),
            "compiled grammar"
        );

        Ok(Compiled {
            start_state,
            final_state,
            num_states: self.context.num_states(),
            num_arcs,
            vocabulary: self.context.vocabulary,
            output_words: self.context.output_words,
            used_slots: self.context.used_slots,
        })
    }

    /// Compiles a single expression, starting at `source`. Returns the state
    /// where the expression's sub-graph ends.
    pub fn compile_expression<W: Write>(
        &mut self,
        intent_name: Option<&str>,
        expression: &Expression,
        fst: &mut FstWriter<W>,
        source: StateId,
    ) -> Result<StateId, Error> {
        expression.compile(self, fst, intent_name, source)
    }

    fn new_state(&mut self) -> StateId {
        self.context.states.next_state()
    }

    /// Encodes a marker and registers it as an output word.
    fn marker(&mut self, marker: Marker) -> String {
        let word = marker.encode();
        tracing::trace!(%marker, %word);
        self.context.output_words.insert(word.clone());
        word
    }

    /// Expands a slot, rule or number range. Expansions are cached by
    /// signature.
    fn expand(&mut self, key: &SlotKey) -> Result<Rc<Expansion>, Error> {
        let signature = key.signature(&self.parameters.number_language);
        if let Some(expansion) = self.context.expansions.get(&signature) {
            return Ok(expansion.clone());
        }

        let expansion = match key {
            SlotKey::Slot(slot_name) => self.expand_slot(slot_name)?,
            SlotKey::Rule(qualified_name) => {
                let rule = self
                    .grammar
                    .rule(qualified_name)
                    .ok_or_else(|| Error::UnknownRule(qualified_name.clone()))?;

                Expansion {
                    sentences: vec![rule.body.clone()],
                    contents: format!("{}\n", rule.body),
                    intent_name: rule.intent_name.clone(),
                }
            }
            SlotKey::Range { lower, upper, step } => self.expand_range(*lower, *upper, *step)?,
        };

        tracing::debug!(
            %signature,
            values = expansion.sentences.len(),
            "expanded"
        );

        let expansion = Rc::new(expansion);
        self.context
            .expansions
            .insert(signature, expansion.clone());
        Ok(expansion)
    }

    fn expand_slot(&self, slot_name: &str) -> Result<Expansion, Error> {
        let file = self.slots.load(slot_name)?;

        let sentences = file
            .values()
            .map(|(line_number, value)| {
                let metadata = ParseMetadata {
                    source_name: file.source_name.clone(),
                    line_number,
                    intent_name: None,
                };
                Sentence::parse(value, Some(&metadata))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Expansion {
            sentences,
            contents: file.contents,
            intent_name: None,
        })
    }

    fn expand_range(&self, lower: i64, upper: i64, step: i64) -> Result<Expansion, Error> {
        let step_by = usize::try_from(step).map_err(|_| {
            Error::InvalidRange {
                lower,
                upper,
                step,
                reason: "step is too large",
            }
        })?;

        let mut sentences = vec![];
        let mut contents = String::new();

        for number in (lower..=upper).step_by(step_by) {
            let items = self
                .numbers
                .to_words(number, &self.parameters.number_language)?
                .into_iter()
                .map(|word| Expression::from(Word::new(word)))
                .collect();

            let sentence = Sentence(Sequence {
                substitution: Some(Substitution::text(number.to_string())),
                ..Sequence::group(items)
            });

            contents.push_str(&sentence.to_string());
            contents.push('\n');
            sentences.push(sentence);
        }

        Ok(Expansion {
            sentences,
            contents,
            intent_name: None,
        })
    }
}

/// Compiles `grammar` and writes the acceptor to `writer`.
pub fn compile<W: Write>(
    grammar: &Grammar,
    slots: &dyn SlotSource,
    numbers: &dyn NumberToWords,
    parameters: CompilerParameters,
    writer: W,
) -> Result<Compiled, Error> {
    Compiler::new(grammar, slots, numbers, parameters)?.compile_grammar(writer)
}
