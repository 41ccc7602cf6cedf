use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    rc::{Rc, Weak},
};

use lru::LruCache;
use rpds::HashTrieMap;

use crate::{
    options::Options,
    prelude::*,
    term::{Alias, Native, Term, Var},
};

/// Pending substitution, keyed by variable identity.
pub(crate) type Env = HashTrieMap<usize, TermRef>;

#[derive(Debug)]
pub struct Builtins {
    pub i: TermRef,
    pub k: TermRef,
    pub s: TermRef,
    pub b: TermRef,
    pub c: TermRef,
    pub w: TermRef,
    pub succ: TermRef,
}

impl Builtins {
    fn new() -> Self {
        Self {
            i: Native::builtin("I", 1, |a| a[0].clone()).into_term(),
            k: Native::builtin("K", 2, |a| a[0].clone()).into_term(),
            s: Native::builtin("S", 3, |a| {
                Term::apply(&a[0], [a[2].clone(), Term::apply(&a[1], [a[2].clone()])])
            })
            .into_term(),
            b: Native::builtin("B", 3, |a| {
                Term::apply(&a[0], [Term::apply(&a[1], [a[2].clone()])])
            })
            .into_term(),
            c: Native::builtin("C", 3, |a| Term::apply(&a[0], [a[2].clone(), a[1].clone()]))
                .into_term(),
            w: Native::builtin("W", 2, |a| Term::apply(&a[0], [a[1].clone(), a[1].clone()]))
                .into_term(),
            succ: crate::numeral::successor().into_term(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TermRef> {
        Some(match name {
            "I" => &self.i,
            "K" => &self.k,
            "S" => &self.s,
            "B" => &self.b,
            "C" => &self.c,
            "W" => &self.w,
            "+" => &self.succ,
            _ => return None,
        })
    }
}

/// Owner of everything the engine needs beyond the terms themselves:
/// variable identities, the settled-node table, budgets and the built-ins.
pub struct Machine {
    options: Options,
    next_id: Cell<usize>,
    settled: RefCell<LruCache<usize, Weak<Term>>>,
    builtins: Builtins,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Machine {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            next_id: Cell::new(0),
            settled: RefCell::new(LruCache::new(options.settled_cache)),
            builtins: Builtins::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn builtin(&self, name: &str) -> Option<TermRef> {
        self.builtins.get(name).cloned()
    }

    /// A variable no other term has seen yet.
    pub fn fresh(&self, name: &str) -> Var {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Var::new(Identifier::new(name.to_string()), id)
    }

    pub fn var(&self, name: &str) -> TermRef {
        self.fresh(name).to_term()
    }

    pub fn native(
        &self,
        name: impl Into<String>,
        arity: usize,
        rule: impl Fn(&[TermRef]) -> TermRef + 'static,
    ) -> Result<TermRef, ConstructionError> {
        Ok(Native::new(name, arity, rule)?.into_term())
    }

    pub fn alias(&self, name: impl Into<String>, term: TermRef) -> Result<TermRef, ConstructionError> {
        self.alias_with(name, term, None)
    }

    /// Names `term`. Unless `terminal` says otherwise, a proper alias stays
    /// opaque until it is given all its arguments.
    pub fn alias_with(
        &self,
        name: impl Into<String>,
        term: TermRef,
        terminal: Option<bool>,
    ) -> Result<TermRef, ConstructionError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConstructionError::EmptyName);
        }
        let guess = self.search(&term, self.options.limits());
        let arity = match guess.arity {
            Some(arity) if guess.found && guess.proper => arity,
            _ => 0,
        };
        tracing::debug!(%name, arity, proper = guess.proper, "declared alias");
        Ok(Term::Alias(Rc::new(Alias {
            name: name.into(),
            term,
            arity,
            proper: guess.proper,
            terminal: terminal.unwrap_or(guess.proper),
            canonical: guess.canonical,
        }))
        .into())
    }

    /// Replaces every alias by its definition, recursively. Nothing is computed.
    pub fn expand(&self, term: &TermRef) -> TermRef {
        deep(|| match term.as_ref() {
            Term::Apply(fun, args) => Term::apply(
                &self.expand(fun),
                args.iter().map(|arg| self.expand(arg)).collect::<Vec<_>>(),
            ),
            Term::Abstract(var, body) => Term::Abstract(var.clone(), self.expand(body)).into(),
            Term::Alias(alias) => self.expand(&alias.term),
            Term::Variable(_) | Term::Native(_) => term.clone(),
        })
    }

    /// `x->y->...->body`. Every binder is replaced by a fresh variable so that
    /// abstractions built from the same names never share identities.
    pub fn lambda(&self, binders: &[Var], body: TermRef) -> Result<TermRef, ConstructionError> {
        if binders.is_empty() {
            return Err(ConstructionError::EmptyBinders);
        }
        let mut seen = HashSet::new();
        for var in binders {
            if !seen.insert(var.name()) {
                return Err(ConstructionError::DuplicateBinder(var.name().to_string()));
            }
        }
        let fresh: Vec<Var> = binders.iter().map(|var| self.fresh(var.name())).collect();
        let env = binders
            .iter()
            .zip(&fresh)
            .fold(Env::new(), |env, (old, new)| env.insert(old.id(), new.to_term()));
        let body = self.substitute(&body, &env).unwrap_or(body);
        Ok(fresh
            .into_iter()
            .rev()
            .fold(body, |body, var| Term::Abstract(var, body).into()))
    }

    pub fn abstraction(&self, var: &Var, body: &TermRef) -> TermRef {
        let fresh = self.fresh(var.name());
        let env = Env::new().insert(var.id(), fresh.to_term());
        let body = self.substitute(body, &env).unwrap_or_else(|| body.clone());
        Term::Abstract(fresh, body).into()
    }

    /// Replaces free variables according to `env`. Returns `None` if nothing changed.
    pub(crate) fn substitute(&self, term: &TermRef, env: &Env) -> Option<TermRef> {
        deep(|| self.substitute_impl(term, env))
    }

    fn substitute_impl(&self, term: &TermRef, env: &Env) -> Option<TermRef> {
        match term.as_ref() {
            Term::Variable(var) => env.get(&var.id()).cloned(),
            Term::Native(_) => None,
            Term::Alias(alias) if alias.terminal => None,
            Term::Alias(alias) => self.substitute(&alias.term, env),
            Term::Apply(fun, args) => {
                let new_fun = self.substitute(fun, env);
                let mut changed = new_fun.is_some();
                let new_args: Vec<TermRef> = args
                    .iter()
                    .map(|arg| {
                        self.substitute(arg, env)
                            .map(|arg| {
                                changed = true;
                                arg
                            })
                            .unwrap_or_else(|| arg.clone())
                    })
                    .collect();
                changed.then(|| Term::apply(new_fun.as_ref().unwrap_or(fun), new_args))
            }
            Term::Abstract(var, body) => {
                let env = env.remove(&var.id());
                if env.is_empty() {
                    return None;
                }
                if env.values().any(|value| value.occurs(var)) {
                    let fresh = self.fresh(var.name());
                    let env = env.insert(var.id(), fresh.to_term());
                    let body = self.substitute(body, &env).unwrap_or_else(|| body.clone());
                    return Some(Term::Abstract(fresh, body).into());
                }
                self.substitute(body, &env)
                    .map(|body| Term::Abstract(var.clone(), body).into())
            }
        }
    }

    /// `(var->body) arg`
    pub(crate) fn beta(&self, var: &Var, body: &TermRef, arg: &TermRef) -> TermRef {
        let env = Env::new().insert(var.id(), arg.clone());
        self.substitute(body, &env).unwrap_or_else(|| body.clone())
    }

    /// Structural equality. Abstractions are compared by feeding both the
    /// same fresh variable, so bound names do not matter.
    pub fn equals(&self, lhs: &Term, rhs: &Term) -> bool {
        deep(|| self.equals_impl(lhs, rhs))
    }

    fn equals_impl(&self, lhs: &Term, rhs: &Term) -> bool {
        match (lhs, rhs) {
            (Term::Alias(alias), _) if !alias.terminal => self.equals(&alias.term, rhs),
            (_, Term::Alias(alias)) if !alias.terminal => self.equals(lhs, &alias.term),
            (Term::Apply(lhs_fun, lhs_args), Term::Apply(rhs_fun, rhs_args)) => {
                lhs_args.len() == rhs_args.len()
                    && self.equals(lhs_fun, rhs_fun)
                    && lhs_args
                        .iter()
                        .zip(rhs_args)
                        .all(|(lhs, rhs)| self.equals(lhs, rhs))
            }
            (Term::Variable(lhs), Term::Variable(rhs)) => lhs == rhs,
            (Term::Native(lhs), Term::Native(rhs)) => lhs == rhs,
            (Term::Alias(lhs), Term::Alias(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Term::Abstract(lhs_var, lhs_body), Term::Abstract(rhs_var, rhs_body)) => {
                let probe = self.fresh("t").to_term();
                self.equals(
                    &self.beta(lhs_var, lhs_body, &probe),
                    &self.beta(rhs_var, rhs_body, &probe),
                )
            }
            _ => false,
        }
    }

    pub(crate) fn is_settled(&self, term: &TermRef) -> bool {
        let key = Rc::as_ptr(term) as usize;
        let mut settled = self.settled.borrow_mut();
        let hit = settled
            .get(&key)
            .map(|node| node.upgrade().map_or(false, |node| Rc::ptr_eq(&node, term)));
        match hit {
            Some(true) => true,
            Some(false) => {
                settled.pop(&key);
                false
            }
            None => false,
        }
    }

    pub(crate) fn mark_settled(&self, term: &TermRef) {
        let key = Rc::as_ptr(term) as usize;
        self.settled.borrow_mut().put(key, Rc::downgrade(term));
    }
}
