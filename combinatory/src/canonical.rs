use std::collections::BTreeSet;

use crate::{
    machine::Machine,
    options::Limits,
    prelude::*,
    term::{Symbol, Term, Var},
};

/// What feeding fresh probes to a term revealed about it.
#[derive(Clone, Debug, Default)]
pub struct Canonical {
    /// The term stopped asking for arguments within the budget.
    pub found: bool,
    pub arity: Option<usize>,
    /// The result mentions nothing but the probes.
    pub proper: bool,
    /// Proper, and every probe is used exactly once.
    pub linear: bool,
    /// `a->b->...->result`, or a best guess when `found` is false.
    pub canonical: Option<TermRef>,
    pub steps: usize,
    /// Indices of the probes the result drops.
    pub skip: BTreeSet<usize>,
    /// Indices of the probes the result uses more than once.
    pub dup: BTreeSet<usize>,
}

fn probe_name(i: usize) -> String {
    match "abcdefgh".chars().nth(i) {
        Some(c) => c.to_string(),
        None => format!("x{i}"),
    }
}

impl Machine {
    pub fn canonicalize(&self, term: &TermRef) -> Result<Canonical> {
        self.canonicalize_with(term, self.options().limits())
    }

    pub fn canonicalize_with(&self, term: &TermRef, limits: Limits) -> Result<Canonical> {
        let canon = self.search(term, limits);
        if !canon.found && self.options().strict {
            return Err(Error::BudgetExceeded {
                operation: "canonicalize",
                budget: limits.max_args,
            });
        }
        Ok(canon)
    }

    pub(crate) fn search(&self, origin: &TermRef, limits: Limits) -> Canonical {
        let mut steps = 0;
        let mut term = origin.clone();
        let mut probes: Vec<Var> = Vec::new();
        for i in 0..limits.max_args {
            let run = self.evaluate(&term, limits.max_steps);
            steps += run.steps;
            if !run.settled {
                break;
            }
            term = run.term;
            if !term.wants_args() {
                return self.found(probes, term, steps);
            }
            let probe = self.fresh(&probe_name(i));
            term = Term::apply(&term, [probe.to_term()]);
            probes.push(probe);
        }
        tracing::debug!(%term, steps, "no canonical form within budget");
        Canonical {
            steps,
            canonical: self.best_guess(origin, limits),
            ..Canonical::default()
        }
    }

    fn found(&self, probes: Vec<Var>, result: TermRef, steps: usize) -> Canonical {
        let symbols = result.symbols();
        let mut skip = BTreeSet::new();
        let mut dup = BTreeSet::new();
        for (i, probe) in probes.iter().enumerate() {
            match symbols.get(&Symbol::Variable(probe.clone())) {
                None => {
                    skip.insert(i);
                }
                Some(&count) if count > 1 => {
                    dup.insert(i);
                }
                Some(_) => {}
            }
        }
        let proper = symbols
            .keys()
            .all(|symbol| matches!(symbol, Symbol::Variable(var) if probes.contains(var)));
        let linear = proper && skip.is_empty() && dup.is_empty();
        let arity = probes.len();
        let canonical = probes
            .into_iter()
            .rev()
            .fold(result, |body, var| Term::Abstract(var, body).into());
        tracing::debug!(%canonical, arity, proper, linear, "canonicalized");
        Canonical {
            found: true,
            arity: Some(arity),
            proper,
            linear,
            canonical: Some(canonical),
            steps,
            skip,
            dup,
        }
    }

    /// For an `f x` without a canonical form, the canonical forms of `f` and
    /// `x` applied to each other.
    fn best_guess(&self, term: &TermRef, limits: Limits) -> Option<TermRef> {
        let (fun, arg) = Term::split(term)?;
        let fun = self.search(&fun, limits).canonical?;
        let arg = self.search(&arg, limits).canonical?;
        Some(Term::apply(&fun, [arg]))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{apply, options::Options};

    #[test]
    fn test_identity() {
        let m = Machine::default();
        let canon = m.canonicalize(&m.builtins().i).unwrap();
        assert!(canon.found);
        assert_eq!(canon.arity, Some(1));
        assert!(canon.proper);
        assert!(canon.linear);
        let x = m.fresh("x");
        let id = m.lambda(&[x.clone()], x.to_term()).unwrap();
        assert!(m.equals(&canon.canonical.unwrap(), &id));
    }

    #[test]
    fn test_constant() {
        let m = Machine::default();
        let canon = m.canonicalize(&m.builtins().k).unwrap();
        assert_eq!(canon.arity, Some(2));
        assert!(canon.proper);
        assert!(!canon.linear);
        assert_eq!(canon.skip, BTreeSet::from([1]));
        assert!(canon.dup.is_empty());
    }

    #[test]
    fn test_duplication() {
        let m = Machine::default();
        let b = m.builtins();
        let canon = m.canonicalize(&b.s).unwrap();
        assert_eq!(canon.arity, Some(3));
        assert!(canon.proper);
        assert_eq!(canon.dup, BTreeSet::from([2]));

        let canon = m.canonicalize(&apply!(b.s, b.k, b.k)).unwrap();
        assert_eq!(canon.arity, Some(1));
        assert!(canon.linear);
        assert_eq!(canon.steps, 2);
    }

    #[test]
    fn test_improper() {
        let m = Machine::default();
        let b = m.builtins();
        let x = m.var("x");
        let canon = m.canonicalize(&apply!(b.k, x)).unwrap();
        assert!(canon.found);
        assert_eq!(canon.arity, Some(1));
        assert!(!canon.proper);
        assert!(!canon.linear);

        let canon = m.canonicalize(&x).unwrap();
        assert_eq!(canon.arity, Some(0));
        assert!(!canon.proper);
        assert!(m.equals(&canon.canonical.unwrap(), &x));
    }

    #[test]
    fn test_divergence() {
        let m = Machine::default();
        let b = m.builtins();
        let omega = apply!(b.s, b.i, b.i, apply!(b.s, b.i, b.i));
        let limits = Limits {
            max_steps: 50,
            max_args: 4,
        };
        let canon = m.canonicalize_with(&omega, limits).unwrap();
        assert!(!canon.found);
        assert!(!canon.proper);
        assert_eq!(canon.arity, None);
        let a = m.fresh("a");
        let twice = m.lambda(&[a.clone()], apply!(a.to_term(), a.to_term())).unwrap();
        let guess = canon.canonical.unwrap();
        assert!(m.equals(&guess, &apply!(twice, twice)), "{guess}");

        let strict = Machine::new(Options::default().with_strict(true));
        let b = strict.builtins();
        let omega = apply!(b.s, b.i, b.i, apply!(b.s, b.i, b.i));
        assert_eq!(
            strict.canonicalize_with(&omega, limits).unwrap_err(),
            Error::BudgetExceeded {
                operation: "canonicalize",
                budget: 4
            }
        );
    }

    #[test]
    fn test_arity_over_budget() {
        let m = Machine::default();
        let b = m.builtins();
        // K(KK) a b c d -> c
        let term = apply!(b.k, apply!(b.k, b.k));
        let limits = Limits {
            max_steps: 100,
            max_args: 2,
        };
        assert!(!m.canonicalize_with(&term, limits).unwrap().found);

        let canon = m.canonicalize(&term).unwrap();
        assert_eq!(canon.arity, Some(4));
        assert!(canon.proper);
        assert_eq!(canon.skip, BTreeSet::from([0, 1, 3]));
    }

    #[test]
    fn test_numeral() {
        let m = Machine::default();
        let canon = m.canonicalize(&m.church(2)).unwrap();
        assert_eq!(canon.arity, Some(2));
        assert!(canon.proper);
        assert_eq!(canon.dup, BTreeSet::from([0]));
    }
}
