use crate::{
    machine::Machine,
    prelude::*,
    term::{Native, Term},
};

/// `+ n f x -> f (n f x)`. Applied to a numeral it becomes the next numeral
/// right away.
pub(crate) fn successor() -> Native {
    Native::builtin("+", 3, |a| {
        Term::apply(&a[1], [Term::apply(&a[0], [a[1].clone(), a[2].clone()])])
    })
    .with_coercion(|arg| arg.numeral().map(|n| Native::church(n + 1).into_term()))
}

impl Machine {
    pub fn church(&self, n: Nat) -> TermRef {
        Native::church(n).into_term()
    }

    /// Reads a term back as a number by running `term + 0`.
    pub fn to_numeral(&self, term: &TermRef, max: usize) -> Result<Nat> {
        let probe = Term::apply(term, [self.builtins().succ.clone(), self.church(0)]);
        let run = self.evaluate(&probe, max);
        if !run.settled {
            return Err(Error::BudgetExceeded {
                operation: "cast to number",
                budget: max,
            });
        }
        run.term
            .numeral()
            .ok_or_else(|| Error::NotANumber(run.term.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::apply;

    #[test]
    fn test_church() {
        let m = Machine::default();
        let (f, y) = (m.var("f"), m.var("y"));
        let run = m.run_default(&apply!(m.church(2), f, y)).unwrap();
        assert!(m.equals(&run.term, &apply!(f, apply!(f, y))));
        let run = m.run_default(&apply!(m.church(0), f, y)).unwrap();
        assert!(m.equals(&run.term, &y));
    }

    #[test]
    fn test_successor_coercion() {
        let m = Machine::default();
        let succ = &m.builtins().succ;
        let four = apply!(succ, m.church(3));
        assert_eq!(four.numeral(), Some(4));
        assert_eq!(four.to_string(), "4");

        let (f, x) = (m.var("f"), m.var("x"));
        let run = m.run_default(&apply!(succ, f, f, x)).unwrap();
        assert!(m.equals(&run.term, &apply!(f, apply!(f, f, x))));
    }

    #[test]
    fn test_to_numeral() {
        let m = Machine::default();
        let b = m.builtins();
        assert_eq!(m.to_numeral(&m.church(7), 100).unwrap(), 7);
        // S B is another successor
        let five = apply!(b.s, b.b, m.church(4));
        assert_eq!(m.to_numeral(&five, 100).unwrap(), 5);
        // K I is zero
        assert_eq!(m.to_numeral(&apply!(b.k, b.i), 100).unwrap(), 0);

        let x = m.var("x");
        assert!(matches!(m.to_numeral(&x, 100), Err(Error::NotANumber(_))));

        let omega = apply!(b.s, b.i, b.i, apply!(b.s, b.i, b.i));
        assert_eq!(
            m.to_numeral(&omega, 50).unwrap_err(),
            Error::BudgetExceeded {
                operation: "cast to number",
                budget: 50
            }
        );
    }
}
