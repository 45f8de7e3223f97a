use super::{
    Compiler,
    Error,
    SlotKey,
};
use crate::{
    document::Intent,
    template::ast::{
        Expression,
        Sequence,
    },
};

impl<'a> Compiler<'a> {
    /// Expands every slot, rule and number range the grammar uses, once.
    ///
    /// If a slots output directory is set, their values are written there.
    pub fn preprocess(&mut self) -> Result<(), Error> {
        let grammar = self.grammar;
        for intent in &grammar.intents {
            self.preprocess_intent(intent)?;
        }
        Ok(())
    }

    pub fn preprocess_intent(&mut self, intent: &Intent) -> Result<(), Error> {
        tracing::debug!(intent = %intent.name, "preprocessing intent");

        for rule in intent.rules.values() {
            self.visit(SlotKey::Rule(rule.qualified_name()), Some(&intent.name))?;
        }

        for sentence in &intent.sentences {
            self.preprocess_sequence(sentence, Some(&intent.name))?;
        }

        Ok(())
    }

    pub fn preprocess_expression(
        &mut self,
        expression: &Expression,
        intent_name: Option<&str>,
    ) -> Result<(), Error> {
        match expression {
            Expression::Word(_) | Expression::Number(_) => Ok(()),
            Expression::Sequence(sequence) => self.preprocess_sequence(sequence, intent_name),
            Expression::SlotReference(slot) => {
                self.visit(SlotKey::Slot(slot.slot_name.clone()), intent_name)
            }
            Expression::RuleReference(rule) => {
                let qualified_name = rule
                    .qualified_name(intent_name)
                    .ok_or_else(|| Error::UnresolvedRule(rule.rule_name.clone()))?;
                self.visit(SlotKey::Rule(qualified_name), intent_name)
            }
            Expression::NumberRange(range) => self.visit(SlotKey::range(range)?, intent_name),
        }
    }

    fn preprocess_sequence(
        &mut self,
        sequence: &Sequence,
        intent_name: Option<&str>,
    ) -> Result<(), Error> {
        for item in &sequence.items {
            self.preprocess_expression(item, intent_name)?;
        }
        Ok(())
    }

    /// Expands a slot the first time its signature is seen.
    ///
    /// The signature is marked before descending into the values, so that
    /// rules referencing each other are visited once.
    fn visit(&mut self, key: SlotKey, intent_name: Option<&str>) -> Result<(), Error> {
        let signature = key.signature(&self.parameters.number_language);
        if !self.context.used_slots.insert(signature.clone()) {
            tracing::trace!(%signature, "already preprocessed");
            return Ok(());
        }

        let expansion = self.expand(&key)?;
        let intent_name = expansion.intent_name.as_deref().or(intent_name);
        for sentence in &expansion.sentences {
            self.preprocess_sequence(sentence, intent_name)?;
        }

        self.write_slot_values(&signature, &expansion.contents)
    }

    fn write_slot_values(&self, signature: &str, contents: &str) -> Result<(), Error> {
        let Some(dir) = &self.parameters.slots_output_dir
        else {
            return Ok(());
        };

        let dir = dir.join(signature);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("values.txt");
        tracing::debug!(path = %path.display(), "writing slot values");
        std::fs::write(path, contents)?;

        Ok(())
    }
}
