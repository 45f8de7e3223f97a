//! Text format for weighted finite-state acceptors.
//!
//! Every arc is one line `from to input output weight`. The last line names
//! the final state.

use std::io::Write;

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display,
)]
pub struct StateId(pub u64);

/// Hands out state ids, starting at 0.
#[derive(Debug, Default)]
pub struct StateCounter {
    next: u64,
}

impl StateCounter {
    pub fn next_state(&mut self) -> StateId {
        let state = StateId(self.next);
        self.next += 1;
        state
    }

    /// Number of states handed out so far.
    pub fn count(&self) -> u64 {
        self.next
    }
}

pub struct FstWriter<W> {
    writer: W,
    eps: String,
    weight: f64,
    num_arcs: usize,
}

impl<W: Write> FstWriter<W> {
    pub fn new(writer: W, eps: impl Into<String>, weight: f64) -> Self {
        Self {
            writer,
            eps: eps.into(),
            weight,
            num_arcs: 0,
        }
    }

    pub fn eps(&self) -> &str {
        &self.eps
    }

    pub fn arc(
        &mut self,
        from: StateId,
        to: StateId,
        input: &str,
        output: &str,
    ) -> Result<(), std::io::Error> {
        writeln!(
            self.writer,
            "{from} {to} {input} {output} {:?}",
            self.weight
        )?;
        self.num_arcs += 1;
        Ok(())
    }

    /// An arc that consumes nothing, but outputs `output` (or nothing).
    pub fn epsilon_arc(
        &mut self,
        from: StateId,
        to: StateId,
        output: Option<&str>,
    ) -> Result<(), std::io::Error> {
        let output = output.unwrap_or(&self.eps);
        writeln!(
            self.writer,
            "{from} {to} {} {output} {:?}",
            self.eps, self.weight
        )?;
        self.num_arcs += 1;
        Ok(())
    }

    pub fn final_state(&mut self, state: StateId) -> Result<(), std::io::Error> {
        writeln!(self.writer, "{state}")
    }

    pub fn num_arcs(&self) -> usize {
        self.num_arcs
    }

    pub fn flush(&mut self) -> Result<(), std::io::Error> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
