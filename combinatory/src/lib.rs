mod canonical;
mod compiler;
mod evaluator;
mod lambdify;
mod machine;
mod numeral;
mod options;
mod prelude;
mod render;
mod term;

pub use crate::{
    canonical::Canonical,
    compiler::{BracketWalk, Conversion},
    evaluator::{Run, Walk, WalkStep},
    lambdify::{Candidate, Lambdify, Origin},
    machine::{Builtins, Machine},
    options::{Limits, Options},
    prelude::{ConstructionError, Error, Identifier, Nat, Result, TermRef},
    term::{Alias, Native, Symbol, Symbols, Term, Var},
};
