use crate::{machine::Machine, prelude::*, term::Term};

/// Outcome of [`Machine::run`].
#[derive(Clone, Debug)]
pub struct Run {
    pub term: TermRef,
    pub steps: usize,
    /// Whether no rewrite rule applies to `term` anymore.
    pub settled: bool,
}

/// One element of [`Machine::walk`]: a term, the steps it took to reach it,
/// and whether it is the final one.
#[derive(Clone, Debug)]
pub struct WalkStep {
    pub term: TermRef,
    pub steps: usize,
    pub settled: bool,
}

impl Machine {
    /// Rewrites the root rule, if any, applicable to `fun args`.
    fn reduce_root(&self, fun: &TermRef, args: &[TermRef]) -> Option<TermRef> {
        match fun.as_ref() {
            Term::Native(native) => native.fire(args),
            Term::Alias(alias) => alias.fire(args),
            Term::Abstract(var, body) => {
                let (arg, rest) = args.split_first()?;
                Some(Term::apply(&self.beta(var, body, arg), rest.iter().cloned()))
            }
            Term::Variable(_) | Term::Apply(_, _) => None,
        }
    }

    /// One normal-order rewrite: the root first, then the function, then the
    /// arguments from left to right. Returns the new term and the number of
    /// steps it took, or `None` if the term is settled.
    pub fn step(&self, term: &TermRef) -> Option<(TermRef, usize)> {
        deep(|| self.step_impl(term))
    }

    fn step_impl(&self, term: &TermRef) -> Option<(TermRef, usize)> {
        match term.as_ref() {
            Term::Apply(fun, args) => {
                if self.is_settled(term) {
                    return None;
                }
                if let Some(next) = self.reduce_root(fun, args) {
                    return Some((next, 1));
                }
                if let Some((fun, steps)) = self.step(fun) {
                    return Some((Term::apply(&fun, args.iter().cloned()), steps));
                }
                for (i, arg) in args.iter().enumerate() {
                    if let Some((arg, steps)) = self.step(arg) {
                        let mut args = args.clone();
                        args[i] = arg;
                        return Some((Term::apply(fun, args), steps));
                    }
                }
                self.mark_settled(term);
                None
            }
            // An alias waiting for arguments is opaque, otherwise expanding it is free.
            Term::Alias(alias) if alias.arity == 0 => Some((alias.term.clone(), 0)),
            Term::Alias(_) | Term::Variable(_) | Term::Native(_) | Term::Abstract(_, _) => None,
        }
    }

    /// Steps until the term settles or `max` steps have been taken.
    pub fn run(&self, term: &TermRef, max: usize) -> Result<Run> {
        let run = self.evaluate(term, max);
        if !run.settled && self.options().strict {
            return Err(Error::BudgetExceeded {
                operation: "run",
                budget: max,
            });
        }
        Ok(run)
    }

    /// [`Machine::run`] with the default step budget.
    pub fn run_default(&self, term: &TermRef) -> Result<Run> {
        self.run(term, self.options().max_steps)
    }

    pub(crate) fn evaluate(&self, term: &TermRef, max: usize) -> Run {
        let mut term = term.clone();
        let mut steps = 0;
        let settled = loop {
            match self.step(&term) {
                None => break true,
                Some(_) if steps >= max => break false,
                Some((next, taken)) => {
                    steps += taken;
                    term = next;
                }
            }
        };
        tracing::trace!(steps, settled, "run finished");
        Run {
            term,
            steps,
            settled,
        }
    }

    /// The sequence of intermediate terms, starting with `term` itself.
    /// `None` means no step limit.
    pub fn walk(&self, term: &TermRef, max: Option<usize>) -> Walk<'_> {
        Walk {
            machine: self,
            term: Some(term.clone()),
            steps: 0,
            max,
        }
    }
}

pub struct Walk<'m> {
    machine: &'m Machine,
    term: Option<TermRef>,
    steps: usize,
    max: Option<usize>,
}

impl<'m> Iterator for Walk<'m> {
    type Item = WalkStep;

    fn next(&mut self) -> Option<Self::Item> {
        let term = self.term.take()?;
        let steps = self.steps;
        match self.machine.step(&term) {
            None => Some(WalkStep {
                term,
                steps,
                settled: true,
            }),
            Some((next, taken)) => {
                if self.max.map_or(true, |max| steps < max) {
                    self.steps += taken;
                    self.term = Some(next);
                }
                Some(WalkStep {
                    term,
                    steps,
                    settled: false,
                })
            }
        }
    }
}
