use std::rc::Rc;

use thiserror::Error;

pub type Nat = u64;
pub type Identifier = Rc<String>;
pub type TermRef = Rc<crate::term::Term>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("Attempt to create an application with no arguments")]
    EmptyApplication,
    #[error("Attempt to create an abstraction with no bound variables")]
    EmptyBinders,
    #[error("Duplicate bound variable `{0}` in abstraction")]
    DuplicateBinder(String),
    #[error("Attempt to create a named term with an empty name")]
    EmptyName,
    #[error("Native combinator `{0}` must take at least one argument")]
    ZeroArity(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    #[error("Failed to {operation} within {budget} steps")]
    BudgetExceeded {
        operation: &'static str,
        budget: usize,
    },
    #[error("Failed to find a canonical form of `{0}`")]
    NotCanonical(String),
    #[error("Attempt to cast a non-numeric term to number: `{0}`")]
    NotANumber(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Minimum stack space to keep before descending into a subterm (32 KB).
const STACK_RED_ZONE: usize = 32 * 1024;

/// Stack size to grow by when running low (1 MB).
const STACK_GROWTH_SIZE: usize = 1024 * 1024;

/// Runs `f`, switching to a fresh stack segment first if the current one is
/// nearly exhausted. Every walk that recurses once per level of nesting goes
/// through here.
pub(crate) fn deep<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH_SIZE, f)
}
