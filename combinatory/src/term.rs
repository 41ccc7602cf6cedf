use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    rc::Rc,
};

use crate::prelude::*;

pub type Rule = Rc<dyn Fn(&[TermRef]) -> TermRef>;
pub type Coercion = Rc<dyn Fn(&TermRef) -> Option<TermRef>>;

/// A free or bound variable. The name is only used for printing, identity
/// comes from the [`crate::Machine`] that minted it.
#[derive(Clone, derive_more::Display, Debug)]
#[display(fmt = "{name}")]
pub struct Var {
    name: Identifier,
    id: usize,
}
impl Var {
    pub(crate) fn new(name: Identifier, id: usize) -> Self {
        Self { name, id }
    }
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
    pub fn id(&self) -> usize {
        self.id
    }
    pub fn to_term(&self) -> TermRef {
        Term::Variable(self.clone()).into()
    }
}
impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Var {}
impl Hash for Var {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

/// A combinator that rewrites its first `arity` arguments natively.
pub struct Native {
    name: Identifier,
    arity: usize,
    rule: Rule,
    coercion: Option<Coercion>,
    numeral: Option<Nat>,
}

impl Native {
    pub fn new(
        name: impl Into<String>,
        arity: usize,
        rule: impl Fn(&[TermRef]) -> TermRef + 'static,
    ) -> Result<Self, ConstructionError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConstructionError::EmptyName);
        }
        if arity == 0 {
            return Err(ConstructionError::ZeroArity(name));
        }
        Ok(Self {
            name: name.into(),
            arity,
            rule: Rc::new(rule),
            coercion: None,
            numeral: None,
        })
    }

    /// Hook tried on the first argument whenever this combinator is applied.
    /// Returning a term replaces `self arg` by that term.
    pub fn with_coercion(self, hook: impl Fn(&TermRef) -> Option<TermRef> + 'static) -> Self {
        Self {
            coercion: Some(Rc::new(hook)),
            ..self
        }
    }

    /// The Church numeral `n f x = f (f ... (f x))`.
    pub fn church(n: Nat) -> Self {
        let rule = move |args: &[TermRef]| {
            let mut term = args[1].clone();
            for _ in 0..n {
                term = Term::apply(&args[0], [term]);
            }
            term
        };
        Self {
            name: n.to_string().into(),
            arity: 2,
            rule: Rc::new(rule),
            coercion: None,
            numeral: Some(n),
        }
    }

    /// Built-in combinators whose names and arities are known to be valid.
    pub(crate) fn builtin(
        name: &'static str,
        arity: usize,
        rule: impl Fn(&[TermRef]) -> TermRef + 'static,
    ) -> Self {
        Self {
            name: Identifier::new(name.to_string()),
            arity,
            rule: Rc::new(rule),
            coercion: None,
            numeral: None,
        }
    }

    pub fn into_term(self) -> TermRef {
        Term::Native(self.into()).into()
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }
    pub fn arity(&self) -> usize {
        self.arity
    }
    pub fn numeral(&self) -> Option<Nat> {
        self.numeral
    }

    pub(crate) fn fire(&self, args: &[TermRef]) -> Option<TermRef> {
        if args.len() < self.arity {
            return None;
        }
        let (used, rest) = args.split_at(self.arity);
        Some(Term::apply(&(self.rule)(used), rest.iter().cloned()))
    }
}

impl PartialEq for Native {
    fn eq(&self, other: &Self) -> bool {
        match (self.numeral, other.numeral) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            (None, None) => std::ptr::eq(self, other),
            _ => false,
        }
    }
}

impl std::fmt::Display for Native {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl std::fmt::Debug for Native {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Native")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("numeral", &self.numeral)
            .finish_non_exhaustive()
    }
}

/// A named term. Terminal aliases behave as opaque symbols until they are
/// given `arity` arguments.
#[derive(Debug)]
pub struct Alias {
    pub(crate) name: Identifier,
    pub(crate) term: TermRef,
    pub(crate) arity: usize,
    pub(crate) proper: bool,
    pub(crate) terminal: bool,
    pub(crate) canonical: Option<TermRef>,
}

impl Alias {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
    pub fn term(&self) -> &TermRef {
        &self.term
    }
    pub fn arity(&self) -> usize {
        self.arity
    }
    pub fn is_proper(&self) -> bool {
        self.proper
    }
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }
    pub fn canonical(&self) -> Option<&TermRef> {
        self.canonical.as_ref()
    }

    pub(crate) fn fire(&self, args: &[TermRef]) -> Option<TermRef> {
        (args.len() >= self.arity).then(|| Term::apply(&self.term, args.iter().cloned()))
    }
}

impl std::fmt::Display for Alias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug)]
pub enum Term {
    /// `f a b ...`, never nested in function position and never without arguments.
    Apply(TermRef, Vec<TermRef>),
    Variable(Var),
    Native(Rc<Native>),
    Alias(Rc<Alias>),
    /// `x->body`
    Abstract(Var, TermRef),
}

// Deep applications are released with an explicit stack instead of one
// native frame per level.
impl Drop for Term {
    fn drop(&mut self) {
        let Term::Apply(_, args) = self else {
            return;
        };
        let mut stack = std::mem::take(args);
        while let Some(term) = stack.pop() {
            if let Ok(mut term) = Rc::try_unwrap(term) {
                if let Term::Apply(_, args) = &mut term {
                    stack.append(args);
                }
            }
        }
    }
}

impl From<Var> for Term {
    fn from(var: Var) -> Self {
        Term::Variable(var)
    }
}

/// Terminal symbol of a term, compared by identity (numerals by value).
#[derive(Clone, derive_more::Display, Debug)]
pub enum Symbol {
    #[display(fmt = "{_0}")]
    Variable(Var),
    #[display(fmt = "{_0}")]
    Native(Rc<Native>),
    #[display(fmt = "{_0}")]
    Alias(Rc<Alias>),
    /// Marks that an abstraction occurs somewhere in the term.
    #[display(fmt = "->")]
    Lambda,
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Symbol::Variable(lhs), Symbol::Variable(rhs)) => lhs == rhs,
            (Symbol::Native(lhs), Symbol::Native(rhs)) => lhs == rhs,
            (Symbol::Alias(lhs), Symbol::Alias(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Symbol::Lambda, Symbol::Lambda) => true,
            _ => false,
        }
    }
}
impl Eq for Symbol {}
impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Symbol::Variable(var) => var.hash(state),
            Symbol::Native(native) => match native.numeral {
                Some(n) => n.hash(state),
                None => (Rc::as_ptr(native) as *const () as usize).hash(state),
            },
            Symbol::Alias(alias) => (Rc::as_ptr(alias) as *const () as usize).hash(state),
            Symbol::Lambda => {}
        }
    }
}

impl Symbol {
    /// The symbol an atomic term stands for.
    pub fn of(term: &Term) -> Option<Symbol> {
        match term {
            Term::Variable(var) => Some(Symbol::Variable(var.clone())),
            Term::Native(native) => Some(Symbol::Native(native.clone())),
            Term::Alias(alias) if alias.terminal => Some(Symbol::Alias(alias.clone())),
            Term::Alias(alias) => Symbol::of(&alias.term),
            Term::Apply(_, _) | Term::Abstract(_, _) => None,
        }
    }
}

pub type Symbols = HashMap<Symbol, usize>;

impl Term {
    /// Applies `fun` to `args` without computing anything.
    pub fn apply(fun: &TermRef, args: impl IntoIterator<Item = TermRef>) -> TermRef {
        let args: Vec<TermRef> = args.into_iter().collect();
        if args.is_empty() {
            return fun.clone();
        }
        match fun.as_ref() {
            Term::Apply(inner, init) => {
                Term::apply(inner, init.iter().cloned().chain(args))
            }
            Term::Native(native) => {
                if let Some(coerced) = native.coercion.as_ref().and_then(|hook| hook(&args[0])) {
                    return Term::apply(&coerced, args.into_iter().skip(1));
                }
                Term::Apply(fun.clone(), args).into()
            }
            _ => Term::Apply(fun.clone(), args).into(),
        }
    }

    /// Like [`Term::apply`], but refuses an empty argument list.
    pub fn application(fun: &TermRef, args: Vec<TermRef>) -> Result<TermRef, ConstructionError> {
        if args.is_empty() {
            return Err(ConstructionError::EmptyApplication);
        }
        Ok(Term::apply(fun, args))
    }

    /// Splits `f a b c` into `(f a b, c)`.
    pub fn split(term: &TermRef) -> Option<(TermRef, TermRef)> {
        if let Term::Apply(fun, args) = term.as_ref() {
            let (last, init) = args.split_last()?;
            Some((Term::apply(fun, init.iter().cloned()), last.clone()))
        } else {
            None
        }
    }

    pub fn as_variable(&self) -> Option<&Var> {
        if let Term::Variable(var) = self {
            Some(var)
        } else {
            None
        }
    }

    pub fn numeral(&self) -> Option<Nat> {
        if let Term::Native(native) = self {
            native.numeral
        } else {
            None
        }
    }

    pub fn is_variable(&self, var: &Var) -> bool {
        self.as_variable() == Some(var)
    }

    /// Rough size of the term; free variables are free.
    pub fn weight(&self) -> usize {
        deep(|| match self {
            Term::Apply(fun, args) => args.iter().map(|arg| arg.weight()).sum::<usize>() + fun.weight(),
            Term::Variable(_) => 0,
            Term::Native(_) => 1,
            Term::Alias(alias) if !alias.terminal => alias.term.weight(),
            Term::Alias(_) => 1,
            Term::Abstract(_, body) => body.weight() + 1,
        })
    }

    /// Multiset of terminal symbols.
    pub fn symbols(&self) -> Symbols {
        fn rec(term: &Term, out: &mut Symbols) {
            deep(|| match term {
                Term::Apply(fun, args) => {
                    rec(fun, out);
                    for arg in args {
                        rec(arg, out);
                    }
                }
                Term::Variable(var) => *out.entry(Symbol::Variable(var.clone())).or_default() += 1,
                Term::Native(native) => *out.entry(Symbol::Native(native.clone())).or_default() += 1,
                Term::Alias(alias) if !alias.terminal => rec(&alias.term, out),
                Term::Alias(alias) => *out.entry(Symbol::Alias(alias.clone())).or_default() += 1,
                Term::Abstract(var, body) => {
                    let mut inner = body.symbols();
                    inner.remove(&Symbol::Variable(var.clone()));
                    for (symbol, count) in inner {
                        *out.entry(symbol).or_default() += count;
                    }
                    *out.entry(Symbol::Lambda).or_default() += 1;
                }
            })
        }
        let mut out = Symbols::new();
        rec(self, &mut out);
        out
    }

    /// Whether `var` occurs free.
    pub fn occurs(&self, var: &Var) -> bool {
        deep(|| match self {
            Term::Apply(fun, args) => fun.occurs(var) || args.iter().any(|arg| arg.occurs(var)),
            Term::Variable(v) => v == var,
            Term::Native(_) => false,
            Term::Alias(alias) => !alias.terminal && alias.term.occurs(var),
            Term::Abstract(bound, body) => bound != var && body.occurs(var),
        })
    }

    /// Whether every terminal symbol is a free variable.
    pub fn free_only(&self) -> bool {
        deep(|| match self {
            Term::Apply(fun, args) => fun.free_only() && args.iter().all(|arg| arg.free_only()),
            Term::Variable(_) => true,
            Term::Alias(alias) if !alias.terminal => alias.term.free_only(),
            Term::Native(_) | Term::Alias(_) | Term::Abstract(_, _) => false,
        })
    }

    /// Whether feeding more arguments may still trigger a rewrite,
    /// i.e. the head of the term is not a free variable.
    pub fn wants_args(&self) -> bool {
        match self {
            Term::Apply(fun, _) => fun.wants_args(),
            Term::Variable(_) => false,
            Term::Alias(alias) => alias.term.wants_args(),
            Term::Native(_) | Term::Abstract(_, _) => true,
        }
    }
}

/// `apply!(f, a, b)` is `f a b`.
#[macro_export]
macro_rules! apply {
    ($fun:expr $(, $arg:expr)+ $(,)?) => {
        $crate::Term::apply(&$fun, [$(::std::rc::Rc::clone(&$arg)),+])
    };
}
