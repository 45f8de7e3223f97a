use std::io::Write;

use super::{
    fst::{
        FstWriter,
        StateId,
    },
    markers::Marker,
    Compiler,
    Error,
    SlotKey,
};
use crate::{
    template::ast::{
        Expression,
        Number,
        NumberRange,
        RuleReference,
        Sentence,
        Sequence,
        SequenceKind,
        SlotReference,
        Substitution,
        Tag,
        Word,
    },
    utils::IsLast,
};

/// Emits the arcs for an AST node, starting at `source`, and returns the
/// state where the node's sub-graph ends.
pub(super) trait Compile {
    fn compile<W: Write>(
        &self,
        compiler: &mut Compiler<'_>,
        fst: &mut FstWriter<W>,
        intent_name: Option<&str>,
        source: StateId,
    ) -> Result<StateId, Error>;
}

impl Compile for Expression {
    fn compile<W: Write>(
        &self,
        compiler: &mut Compiler<'_>,
        fst: &mut FstWriter<W>,
        intent_name: Option<&str>,
        source: StateId,
    ) -> Result<StateId, Error> {
        match self {
            Expression::Word(word) => word.compile(compiler, fst, intent_name, source),
            Expression::Sequence(sequence) => sequence.compile(compiler, fst, intent_name, source),
            Expression::RuleReference(rule) => rule.compile(compiler, fst, intent_name, source),
            Expression::SlotReference(slot) => slot.compile(compiler, fst, intent_name, source),
            Expression::Number(number) => number.compile(compiler, fst, intent_name, source),
            Expression::NumberRange(range) => range.compile(compiler, fst, intent_name, source),
        }
    }
}

impl Compile for Sentence {
    fn compile<W: Write>(
        &self,
        compiler: &mut Compiler<'_>,
        fst: &mut FstWriter<W>,
        intent_name: Option<&str>,
        source: StateId,
    ) -> Result<StateId, Error> {
        self.0.compile(compiler, fst, intent_name, source)
    }
}

impl Compile for Word {
    fn compile<W: Write>(
        &self,
        compiler: &mut Compiler<'_>,
        fst: &mut FstWriter<W>,
        _intent_name: Option<&str>,
        source: StateId,
    ) -> Result<StateId, Error> {
        compiler.decorated(
            fst,
            source,
            self.tag.as_ref(),
            self.substitution.as_ref(),
            |compiler, fst, source| {
                // a quoted phrase gets one arc per word, labels can't hold spaces.
                let words = self.text.split_whitespace().collect::<Vec<_>>();

                if words.is_empty() {
                    let target = compiler.new_state();
                    fst.epsilon_arc(source, target, None)?;
                    return Ok(target);
                }

                let mut state = source;
                for word in words {
                    let target = compiler.new_state();
                    compiler.context.vocabulary.insert(word.to_owned());
                    fst.arc(state, target, word, word)?;
                    state = target;
                }

                Ok(state)
            },
        )
    }
}

impl Compile for Sequence {
    fn compile<W: Write>(
        &self,
        compiler: &mut Compiler<'_>,
        fst: &mut FstWriter<W>,
        intent_name: Option<&str>,
        source: StateId,
    ) -> Result<StateId, Error> {
        compiler.decorated(
            fst,
            source,
            self.tag.as_ref(),
            self.substitution.as_ref(),
            |compiler, fst, source| {
                match self.kind {
                    SequenceKind::Group => {
                        let mut state = source;
                        for item in &self.items {
                            state = item.compile(compiler, fst, intent_name, state)?;
                        }
                        Ok(state)
                    }
                    SequenceKind::Alternative => {
                        // all branches start at `source` and meet again at `exit`.
                        let exit = compiler.new_state();
                        for item in &self.items {
                            let end = item.compile(compiler, fst, intent_name, source)?;
                            fst.epsilon_arc(end, exit, None)?;
                        }
                        Ok(exit)
                    }
                }
            },
        )
    }
}

impl Compile for SlotReference {
    fn compile<W: Write>(
        &self,
        compiler: &mut Compiler<'_>,
        fst: &mut FstWriter<W>,
        intent_name: Option<&str>,
        source: StateId,
    ) -> Result<StateId, Error> {
        compiler.decorated(
            fst,
            source,
            self.tag.as_ref(),
            self.substitution.as_ref(),
            |compiler, fst, source| {
                compiler.compile_slot(&SlotKey::Slot(self.slot_name.clone()), fst, intent_name, source)
            },
        )
    }
}

impl Compile for RuleReference {
    fn compile<W: Write>(
        &self,
        compiler: &mut Compiler<'_>,
        fst: &mut FstWriter<W>,
        intent_name: Option<&str>,
        source: StateId,
    ) -> Result<StateId, Error> {
        let qualified_name = self
            .qualified_name(intent_name)
            .ok_or_else(|| Error::UnresolvedRule(self.rule_name.clone()))?;

        compiler.decorated(fst, source, self.tag.as_ref(), None, |compiler, fst, source| {
            compiler.compile_slot(&SlotKey::Rule(qualified_name), fst, intent_name, source)
        })
    }
}

impl Compile for Number {
    fn compile<W: Write>(
        &self,
        compiler: &mut Compiler<'_>,
        fst: &mut FstWriter<W>,
        _intent_name: Option<&str>,
        source: StateId,
    ) -> Result<StateId, Error> {
        compiler.decorated(
            fst,
            source,
            self.tag.as_ref(),
            self.substitution.as_ref(),
            |compiler, fst, source| {
                let words = compiler
                    .numbers
                    .to_words(self.value, &compiler.parameters.number_language)?;
                let value = self.value.to_string();
                compiler.context.output_words.insert(value.clone());

                // the number's value is output with its last word.
                let mut state = source;
                for (word, is_last) in IsLast::new(words.iter()) {
                    let target = compiler.new_state();
                    let output = if is_last { value.as_str() } else { fst.eps() };
                    let output = output.to_owned();
                    compiler.context.vocabulary.insert(word.clone());
                    fst.arc(state, target, word, &output)?;
                    state = target;
                }

                Ok(state)
            },
        )
    }
}

impl Compile for NumberRange {
    fn compile<W: Write>(
        &self,
        compiler: &mut Compiler<'_>,
        fst: &mut FstWriter<W>,
        intent_name: Option<&str>,
        source: StateId,
    ) -> Result<StateId, Error> {
        let key = SlotKey::range(self)?;

        compiler.decorated(
            fst,
            source,
            self.tag.as_ref(),
            self.substitution.as_ref(),
            |compiler, fst, source| compiler.compile_slot(&key, fst, intent_name, source),
        )
    }
}

impl<'a> Compiler<'a> {
    /// Wraps the sub-graph emitted by `body` with the markers for a tag and a
    /// substitution.
    fn decorated<W, F>(
        &mut self,
        fst: &mut FstWriter<W>,
        source: StateId,
        tag: Option<&Tag>,
        substitution: Option<&Substitution>,
        body: F,
    ) -> Result<StateId, Error>
    where
        W: Write,
        F: FnOnce(&mut Self, &mut FstWriter<W>, StateId) -> Result<StateId, Error>,
    {
        let mut state = source;

        if let Some(tag) = tag {
            state = self.marker_arc(
                fst,
                state,
                Marker::Tag {
                    name: tag.name.clone(),
                },
            )?;
        }

        if let Some(substitution) = substitution {
            state = self.marker_arc(
                fst,
                state,
                Marker::Sub {
                    value: substitution.value(),
                },
            )?;
        }

        state = body(self, fst, state)?;

        if substitution.is_some() {
            state = self.marker_arc(fst, state, Marker::SubEnd)?;
        }

        if tag.is_some() {
            state = self.marker_arc(fst, state, Marker::TagEnd)?;
        }

        Ok(state)
    }

    fn marker_arc<W: Write>(
        &mut self,
        fst: &mut FstWriter<W>,
        source: StateId,
        marker: Marker,
    ) -> Result<StateId, Error> {
        let target = self.new_state();
        let word = self.marker(marker);
        fst.epsilon_arc(source, target, Some(&word))?;
        Ok(target)
    }

    /// Emits a slot: every value is a branch from the slot's enter state to
    /// its exit state.
    ///
    /// Each reference gets its own copy of the sub-graph, but the values are
    /// only expanded once.
    fn compile_slot<W: Write>(
        &mut self,
        key: &SlotKey,
        fst: &mut FstWriter<W>,
        intent_name: Option<&str>,
        source: StateId,
    ) -> Result<StateId, Error> {
        let signature = key.signature(&self.parameters.number_language);
        if self.context.active.contains(&signature) {
            return Err(Error::Recursive(signature));
        }

        let expansion = self.expand(key)?;
        let enter = self.marker_arc(
            fst,
            source,
            Marker::Slot {
                name: signature.clone(),
            },
        )?;
        let exit = self.new_state();

        tracing::trace!(%signature, values = expansion.sentences.len(), "compiling slot");

        let intent_name = expansion.intent_name.as_deref().or(intent_name);
        self.context.active.push(signature);
        for sentence in &expansion.sentences {
            let end = sentence.compile(self, fst, intent_name, enter)?;
            fst.epsilon_arc(end, exit, None)?;
        }
        self.context.active.pop();

        self.marker_arc(fst, exit, Marker::SlotEnd)
    }
}
