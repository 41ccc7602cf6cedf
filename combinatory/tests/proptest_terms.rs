use std::rc::Rc;

use combinatory::{Limits, Machine, Symbol, Term, TermRef};
use proptest::prelude::*;

/// A random SKI term over a few free variables.
#[derive(Clone, Debug)]
enum Shape {
    S,
    K,
    I,
    Var(usize),
    App(Box<Shape>, Box<Shape>),
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        Just(Shape::S),
        Just(Shape::K),
        Just(Shape::I),
        (0..3usize).prop_map(Shape::Var),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        (inner.clone(), inner).prop_map(|(fun, arg)| Shape::App(Box::new(fun), Box::new(arg)))
    })
}

fn build(m: &Machine, vars: &[TermRef], shape: &Shape) -> TermRef {
    let b = m.builtins();
    match shape {
        Shape::S => b.s.clone(),
        Shape::K => b.k.clone(),
        Shape::I => b.i.clone(),
        Shape::Var(i) => vars[*i].clone(),
        Shape::App(fun, arg) => Term::apply(&build(m, vars, fun), [build(m, vars, arg)]),
    }
}

fn setup(shape: &Shape) -> (Machine, TermRef) {
    let m = Machine::default();
    let vars: Vec<TermRef> = ["x", "y", "z"].iter().map(|name| m.var(name)).collect();
    let term = build(&m, &vars, shape);
    (m, term)
}

const LIMITS: Limits = Limits {
    max_steps: 30,
    max_args: 4,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn settled_terms_do_not_move(shape in shape()) {
        let (m, term) = setup(&shape);
        let run = m.run(&term, 200).unwrap();
        prop_assume!(run.settled);
        let again = m.run(&run.term, 200).unwrap();
        prop_assert_eq!(again.steps, 0);
        prop_assert!(Rc::ptr_eq(&again.term, &run.term));
    }

    #[test]
    fn lambdify_weights_decrease(shape in shape()) {
        let (m, term) = setup(&shape);
        let seq: Vec<_> = m.lambdify_with(&term, LIMITS).unwrap().take(16).collect();
        prop_assert!(!seq.is_empty());
        for pair in seq.windows(2) {
            prop_assert!(pair[0].term.weight() > pair[1].term.weight());
        }
        for candidate in &seq {
            let symbols = candidate.term.symbols();
            prop_assert!(symbols
                .keys()
                .all(|symbol| matches!(symbol, Symbol::Variable(_) | Symbol::Lambda)));
        }
    }

    #[test]
    fn bracket_form_behaves_alike(shape in shape()) {
        let (m, term) = setup(&shape);
        let canon = m.canonicalize_with(&term, LIMITS).unwrap();
        prop_assume!(canon.found);
        let (Some(lambda), Some(arity)) = (canon.canonical, canon.arity) else {
            panic!("found without a canonical form");
        };
        let conversion = m.to_bracket_form(&lambda).unwrap();
        prop_assert!(conversion.complete);
        prop_assert!(!conversion.term.symbols().contains_key(&Symbol::Lambda));

        let probes: Vec<TermRef> = (0..arity).map(|i| m.var(&format!("p{i}"))).collect();
        let expected = m.run(&Term::apply(&lambda, probes.clone()), 10_000).unwrap();
        let actual = m.run(&Term::apply(&conversion.term, probes), 10_000).unwrap();
        prop_assert!(expected.settled && actual.settled);
        prop_assert!(m.equals(&expected.term, &actual.term), "{} != {}", expected.term, actual.term);
    }
}
