use std::rc::Rc;

use crate::{
    machine::Machine,
    prelude::*,
    term::{Native, Term, Var},
};

/// Result of [`Machine::to_bracket_form`].
#[derive(Clone, Debug)]
pub struct Conversion {
    pub term: TermRef,
    /// Eliminations spent, counting every native expanded into its canonical form.
    pub eliminations: usize,
    /// Whether the budget sufficed; if not, `term` may still contain abstractions.
    pub complete: bool,
}

struct Budget {
    max: usize,
    used: usize,
    exhausted: bool,
}

impl Budget {
    fn new(max: usize) -> Self {
        Self {
            max,
            used: 0,
            exhausted: false,
        }
    }

    fn take(&mut self) -> bool {
        if self.used >= self.max {
            self.exhausted = true;
            return false;
        }
        self.used += 1;
        true
    }
}

impl Machine {
    /// Rewrites `term` in terms of `S`, `K` and `I` only.
    pub fn to_bracket_form(&self, term: &TermRef) -> Result<Conversion> {
        self.to_bracket_form_with(term, self.options().max_convert)
    }

    pub fn to_bracket_form_with(&self, term: &TermRef, max: usize) -> Result<Conversion> {
        let mut budget = Budget::new(max);
        let term = self.eliminate(term, &mut budget);
        tracing::trace!(eliminations = budget.used, complete = !budget.exhausted, "bracket abstraction");
        if budget.exhausted && self.options().strict {
            return Err(Error::BudgetExceeded {
                operation: "convert to combinators",
                budget: max,
            });
        }
        Ok(Conversion {
            term,
            eliminations: budget.used,
            complete: !budget.exhausted,
        })
    }

    /// Converts `term` gradually, spending at most `per_step` eliminations
    /// between two yielded terms. Starts with `term` itself; the last item is
    /// the first term nothing more can be eliminated from.
    pub fn bracket_walk(&self, term: &TermRef, per_step: usize) -> BracketWalk<'_> {
        BracketWalk {
            machine: self,
            term: Some(term.clone()),
            eliminations: 0,
            per_step: per_step.max(1),
        }
    }

    fn is_basis(&self, native: &Rc<Native>) -> bool {
        let b = self.builtins();
        [&b.i, &b.k, &b.s]
            .into_iter()
            .any(|basis| matches!(basis.as_ref(), Term::Native(basis) if Rc::ptr_eq(basis, native)))
    }

    fn eliminate(&self, term: &TermRef, budget: &mut Budget) -> TermRef {
        deep(|| self.eliminate_impl(term, budget))
    }

    fn eliminate_impl(&self, term: &TermRef, budget: &mut Budget) -> TermRef {
        match term.as_ref() {
            Term::Variable(_) => term.clone(),
            Term::Native(native) if self.is_basis(native) => term.clone(),
            Term::Native(_) => {
                let canonical = self.search(term, self.options().limits()).canonical;
                match canonical {
                    Some(canonical) if budget.take() => self.eliminate(&canonical, budget),
                    _ => term.clone(),
                }
            }
            Term::Alias(alias) => self.eliminate(&alias.term, budget),
            Term::Apply(fun, args) => {
                let fun = self.eliminate(fun, budget);
                let args: Vec<TermRef> = args.iter().map(|arg| self.eliminate(arg, budget)).collect();
                Term::apply(&fun, args)
            }
            Term::Abstract(var, body) => {
                let body = self.eliminate(body, budget);
                if !budget.take() {
                    return Term::Abstract(var.clone(), body).into();
                }
                self.abstract_out(var, body, budget)
            }
        }
    }

    /// `[var] body` for a body that is already free of abstractions.
    fn abstract_out(&self, var: &Var, body: TermRef, budget: &mut Budget) -> TermRef {
        let b = self.builtins();
        if body.is_variable(var) {
            return b.i.clone();
        }
        if !body.occurs(var) {
            return Term::apply(&b.k, [body]);
        }
        match Term::split(&body) {
            Some((init, last)) if last.is_variable(var) && !init.occurs(var) => init,
            Some((init, last)) => {
                let init = self.eliminate(&Term::Abstract(var.clone(), init).into(), budget);
                let last = self.eliminate(&Term::Abstract(var.clone(), last).into(), budget);
                Term::apply(&b.s, [init, last])
            }
            None => Term::Abstract(var.clone(), body).into(),
        }
    }
}

pub struct BracketWalk<'m> {
    machine: &'m Machine,
    term: Option<TermRef>,
    eliminations: usize,
    per_step: usize,
}

impl<'m> Iterator for BracketWalk<'m> {
    type Item = Conversion;

    fn next(&mut self) -> Option<Self::Item> {
        let term = self.term.take()?;
        let mut budget = Budget::new(self.per_step);
        let next = self.machine.eliminate(&term, &mut budget);
        let complete = budget.used == 0;
        if !complete {
            self.term = Some(next);
        }
        let item = Conversion {
            term,
            eliminations: self.eliminations,
            complete,
        };
        self.eliminations += budget.used;
        Some(item)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{apply, options::Options, term::Symbol};

    fn only_ski(m: &Machine, term: &TermRef) -> bool {
        let b = m.builtins();
        let basis = [&b.i, &b.k, &b.s].map(|t| Symbol::of(t));
        term.symbols().keys().all(|symbol| {
            matches!(symbol, Symbol::Variable(_)) || basis.iter().any(|b| b.as_ref() == Some(symbol))
        })
    }

    #[test]
    fn test_basic_rules() {
        let m = Machine::default();
        let b = m.builtins();
        let (x, y) = (m.fresh("x"), m.fresh("y"));

        let id = m.lambda(&[x.clone()], x.to_term()).unwrap();
        let conv = m.to_bracket_form(&id).unwrap();
        assert!(conv.complete);
        assert!(m.equals(&conv.term, &b.i));

        let constant = m.lambda(&[x.clone()], y.to_term()).unwrap();
        let conv = m.to_bracket_form(&constant).unwrap();
        assert!(m.equals(&conv.term, &apply!(b.k, y.to_term())));

        // x->y x is just y
        let eta = m.lambda(&[x.clone()], apply!(y.to_term(), x.to_term())).unwrap();
        let conv = m.to_bracket_form(&eta).unwrap();
        assert!(m.equals(&conv.term, &y.to_term()));

        // x->x y needs S
        let general = m.lambda(&[x.clone()], apply!(x.to_term(), y.to_term())).unwrap();
        let conv = m.to_bracket_form(&general).unwrap();
        assert!(m.equals(&conv.term, &apply!(b.s, b.i, apply!(b.k, y.to_term()))));
    }

    #[test]
    fn test_natives_expand() {
        let m = Machine::default();
        let b = m.builtins();
        let conv = m.to_bracket_form(&b.b).unwrap();
        assert!(conv.complete);
        assert!(only_ski(&m, &conv.term));
        assert!(m.equals(&conv.term, &apply!(b.s, apply!(b.k, b.s), b.k)));

        let conv = m.to_bracket_form(&apply!(b.s, b.k, b.i)).unwrap();
        assert_eq!(conv.eliminations, 0);
        assert!(m.equals(&conv.term, &apply!(b.s, b.k, b.i)));
    }

    #[test]
    fn test_predictable_forms() {
        let m = Machine::default();
        let b = m.builtins();
        let (x, y, z) = (m.fresh("x"), m.fresh("y"), m.fresh("z"));
        let (xt, yt, zt) = (x.to_term(), y.to_term(), z.to_term());
        let cases = [
            (m.lambda(&[x.clone(), y.clone()], xt.clone()).unwrap(), b.k.clone()),
            (
                m.lambda(&[x.clone(), y.clone(), z.clone()], apply!(xt, zt, apply!(yt, zt)))
                    .unwrap(),
                b.s.clone(),
            ),
            (m.lambda(&[x.clone()], xt.clone()).unwrap(), b.i.clone()),
            (m.lambda(&[x.clone()], apply!(xt, xt)).unwrap(), apply!(b.s, b.i, b.i)),
            (
                m.lambda(&[x.clone(), y.clone()], apply!(yt, xt)).unwrap(),
                apply!(b.s, apply!(b.k, apply!(b.s, b.i)), b.k),
            ),
        ];
        for (lambda, expected) in cases {
            let conv = m.to_bracket_form(&lambda).unwrap();
            assert!(conv.complete);
            assert!(m.equals(&conv.term, &expected), "{lambda}: {} != {expected}", conv.term);
        }
    }

    #[test]
    fn test_bracket_walk() {
        let m = Machine::default();
        let (x, y) = (m.fresh("x"), m.fresh("y"));
        let lambda = m.lambda(&[x.clone(), y.clone()], apply!(y.to_term(), x.to_term())).unwrap();
        let whole = m.to_bracket_form(&lambda).unwrap();

        let trace: Vec<_> = m.bracket_walk(&lambda, 1).collect();
        assert!(Rc::ptr_eq(&trace[0].term, &lambda));
        assert_eq!(trace.len(), whole.eliminations + 1);
        assert!(trace[..trace.len() - 1].iter().all(|item| !item.complete));
        assert!(trace.windows(2).all(|w| w[1].eliminations == w[0].eliminations + 1));
        let last = trace.last().unwrap();
        assert!(last.complete);
        assert_eq!(last.eliminations, whole.eliminations);
        assert!(m.equals(&last.term, &whole.term));
        assert_eq!(last.term.to_string(), "S(K(SI))K");

        // a larger allowance takes fewer steps to the same place
        let fast: Vec<_> = m.bracket_walk(&lambda, 4).collect();
        assert_eq!(fast.len(), 3);
        assert!(m.equals(&fast[2].term, &whole.term));

        let b = m.builtins();
        let done: Vec<_> = m.bracket_walk(&apply!(b.s, b.k), 0).collect();
        assert_eq!(done.len(), 1);
        assert!(done[0].complete);
    }

    #[test]
    fn test_budget() {
        let m = Machine::default();
        let b = m.builtins();
        let conv = m.to_bracket_form_with(&b.c, 2).unwrap();
        assert!(!conv.complete);
        assert_eq!(conv.eliminations, 2);
        assert!(conv.term.symbols().contains_key(&Symbol::Lambda));

        let strict = Machine::new(Options::default().with_strict(true));
        assert_eq!(
            strict.to_bracket_form_with(&strict.builtins().c, 2).unwrap_err(),
            Error::BudgetExceeded {
                operation: "convert to combinators",
                budget: 2
            }
        );
    }
}
