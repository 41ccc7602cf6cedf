use crate::{
    machine::Machine,
    options::Limits,
    prelude::*,
    term::{Term, Var},
};

/// How a [`Candidate`] was obtained.
#[derive(Clone, Copy, PartialEq, Eq, Debug, derive_more::Display)]
pub enum Origin {
    #[display(fmt = "only free variables")]
    FreeOnly,
    #[display(fmt = "application")]
    Application,
    #[display(fmt = "abstraction")]
    Abstraction,
    #[display(fmt = "canonical")]
    Canonical,
}

#[derive(Clone, Debug)]
pub struct Candidate {
    pub term: TermRef,
    pub origin: Origin,
    /// Reduction steps spent so far, this candidate included. Never decreases
    /// along a sequence.
    pub steps: usize,
}

impl Machine {
    /// Lambda terms equivalent to `term`, each strictly lighter than the previous one.
    pub fn lambdify(&self, term: &TermRef) -> Result<Lambdify<'_>> {
        self.lambdify_with(term, self.options().limits())
    }

    pub fn lambdify_with(&self, term: &TermRef, limits: Limits) -> Result<Lambdify<'_>> {
        let expanded = self.lambdas_for_natives(&self.expand(term), limits)?;
        Ok(Lambdify {
            inner: Simplify::new(self, limits, expanded, usize::MAX),
        })
    }

    /// Replaces every combinator by its canonical form.
    fn lambdas_for_natives(&self, term: &TermRef, limits: Limits) -> Result<TermRef> {
        deep(|| -> Result<TermRef> {
            Ok(match term.as_ref() {
                Term::Variable(_) => term.clone(),
                Term::Apply(fun, args) => {
                    let fun = self.lambdas_for_natives(fun, limits)?;
                    let args = args
                        .iter()
                        .map(|arg| self.lambdas_for_natives(arg, limits))
                        .collect::<Result<Vec<_>>>()?;
                    Term::apply(&fun, args)
                }
                Term::Abstract(var, body) => {
                    Term::Abstract(var.clone(), self.lambdas_for_natives(body, limits)?).into()
                }
                Term::Alias(alias) => self.lambdas_for_natives(&alias.term, limits)?,
                Term::Native(native) => self
                    .search(term, limits)
                    .canonical
                    .ok_or_else(|| Error::NotCanonical(native.name().to_string()))?,
            })
        })
    }
}

pub struct Lambdify<'m> {
    inner: Simplify<'m>,
}

impl<'m> Iterator for Lambdify<'m> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        let candidate = self.inner.next()?;
        tracing::trace!(
            term = %candidate.term,
            origin = %candidate.origin,
            steps = candidate.steps,
            "lambdify"
        );
        Some(candidate)
    }
}

enum Stage<'m> {
    Start,
    Fun {
        fun: TermRef,
        arg: TermRef,
        inner: Box<Simplify<'m>>,
    },
    Arg {
        fun: TermRef,
        inner: Box<Simplify<'m>>,
    },
    Body {
        var: Var,
        inner: Box<Simplify<'m>>,
    },
    Canonical,
    Done,
}

/// Yields terms equivalent to `term` lighter than `ceiling`, lowering the
/// ceiling with every yield.
struct Simplify<'m> {
    machine: &'m Machine,
    limits: Limits,
    term: TermRef,
    ceiling: usize,
    stage: Stage<'m>,
    steps: usize,
    /// Steps of the stages already finished.
    saved: usize,
}

impl<'m> Simplify<'m> {
    fn new(machine: &'m Machine, limits: Limits, term: TermRef, ceiling: usize) -> Self {
        Self {
            machine,
            limits,
            term,
            ceiling,
            stage: Stage::Start,
            steps: 0,
            saved: 0,
        }
    }

    fn child(&self, term: TermRef, ceiling: usize) -> Box<Simplify<'m>> {
        Box::new(Simplify::new(self.machine, self.limits, term, ceiling))
    }

    fn accept(&mut self, term: TermRef, origin: Origin) -> Option<Candidate> {
        let weight = term.weight();
        (weight < self.ceiling).then(|| {
            self.ceiling = weight;
            Candidate {
                term,
                origin,
                steps: self.steps,
            }
        })
    }
}

impl<'m> Iterator for Simplify<'m> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        deep(|| self.advance())
    }
}

impl<'m> Simplify<'m> {
    fn advance(&mut self) -> Option<Candidate> {
        loop {
            match std::mem::replace(&mut self.stage, Stage::Done) {
                Stage::Start => {
                    if self.term.free_only() {
                        return self.accept(self.term.clone(), Origin::FreeOnly);
                    }
                    self.stage = match self.term.as_ref() {
                        Term::Apply(_, _) => match Term::split(&self.term) {
                            Some((fun, arg)) => {
                                let ceiling = self.ceiling.saturating_sub(arg.weight());
                                let inner = self.child(fun.clone(), ceiling);
                                Stage::Fun { fun, arg, inner }
                            }
                            None => Stage::Canonical,
                        },
                        Term::Abstract(var, body) => Stage::Body {
                            var: var.clone(),
                            inner: self.child(body.clone(), self.ceiling.saturating_sub(1)),
                        },
                        _ => Stage::Canonical,
                    };
                }
                Stage::Fun { fun, arg, mut inner } => match inner.next() {
                    Some(found) => {
                        self.steps = self.saved + found.steps;
                        let term = Term::apply(&found.term, [arg.clone()]);
                        let candidate = self.accept(term, Origin::Application);
                        let fun = if candidate.is_some() { found.term } else { fun };
                        self.stage = Stage::Fun { fun, arg, inner };
                        if candidate.is_some() {
                            return candidate;
                        }
                    }
                    None => {
                        self.saved = self.steps;
                        let inner = self.child(arg, self.ceiling.saturating_sub(fun.weight()));
                        self.stage = Stage::Arg { fun, inner };
                    }
                },
                Stage::Arg { fun, mut inner } => match inner.next() {
                    Some(found) => {
                        self.steps = self.saved + found.steps;
                        let term = Term::apply(&fun, [found.term]);
                        let candidate = self.accept(term, Origin::Application);
                        self.stage = Stage::Arg { fun, inner };
                        if candidate.is_some() {
                            return candidate;
                        }
                    }
                    None => {
                        self.saved = self.steps;
                        self.stage = Stage::Canonical;
                    }
                },
                Stage::Body { var, mut inner } => match inner.next() {
                    Some(found) => {
                        self.steps = self.saved + found.steps;
                        let term = self.machine.abstraction(&var, &found.term);
                        let candidate = self.accept(term, Origin::Abstraction);
                        self.stage = Stage::Body { var, inner };
                        if candidate.is_some() {
                            return candidate;
                        }
                    }
                    None => {
                        self.saved = self.steps;
                        self.stage = Stage::Canonical;
                    }
                },
                Stage::Canonical => {
                    let canon = self.machine.search(&self.term, self.limits);
                    self.steps = self.saved + canon.steps;
                    return canon
                        .canonical
                        .and_then(|term| self.accept(term, Origin::Canonical));
                }
                Stage::Done => return None,
            }
        }
    }
}
