use crate::{machine::Machine, prelude::*, term::Term};

/// Token classes deciding whether two neighbouring terms need a space between them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Class {
    Unknown,
    Parens,
    Upper,
    Lower,
}

fn can_lump(prev: Class, next: Class) -> bool {
    use Class::*;
    matches!(
        (prev, next),
        (Parens, Parens)
            | (Parens, Upper)
            | (Upper, Parens)
            | (Upper, Upper)
            | (Upper, Lower)
            | (Lower, Parens)
            | (Unknown, Parens)
    )
}

fn is_upper(s: &str) -> bool {
    let mut chars = s.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_uppercase())
}

fn is_lower_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().map_or(false, |c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Class of an atomic term. `None` for anything that is printed like a compound term.
fn atom_class(term: &Term) -> Option<Class> {
    let name = match term {
        Term::Variable(var) if is_upper(var.name()) => return Some(Class::Upper),
        Term::Variable(_) => return Some(Class::Lower),
        Term::Native(native) => native.name(),
        Term::Alias(alias) => alias.name(),
        Term::Apply(_, _) | Term::Abstract(_, _) => return None,
    };
    if is_upper(name) {
        Some(Class::Upper)
    } else if is_lower_ident(name) {
        Some(Class::Lower)
    } else if is_number(name) {
        Some(Class::Unknown)
    } else {
        None
    }
}

impl Term {
    /// Whether the term has to be parenthesized when something follows it.
    pub fn needs_parens(&self) -> bool {
        matches!(self, Term::Abstract(_, _))
    }

    /// Terse rendering drops the separators that the token classes make redundant,
    /// verbose rendering parenthesizes every argument.
    pub fn render(&self, terse: bool) -> String {
        let mut out = String::new();
        self.render_into(terse, &mut out);
        out
    }

    fn render_into(&self, terse: bool, out: &mut String) {
        deep(|| match self {
            Term::Variable(var) => out.push_str(var.name()),
            Term::Native(native) => out.push_str(native.name()),
            Term::Alias(alias) => out.push_str(alias.name()),
            Term::Abstract(var, body) => {
                out.push_str(var.name());
                out.push_str("->");
                body.render_into(terse, out);
            }
            Term::Apply(fun, args) if terse => {
                let mut prev = Class::Unknown;
                for (i, term) in std::iter::once(fun).chain(args).enumerate() {
                    let (next, parens) = match atom_class(term) {
                        Some(class) => (class, false),
                        None if i > 0 || term.needs_parens() => (Class::Parens, true),
                        None => (Class::Unknown, false),
                    };
                    if i > 0 && !can_lump(prev, next) {
                        out.push(' ');
                    }
                    wrap(out, parens, |out| term.render_into(terse, out));
                    prev = next;
                }
            }
            Term::Apply(fun, args) => {
                wrap(out, fun.needs_parens(), |out| fun.render_into(terse, out));
                for arg in args {
                    wrap(out, true, |out| arg.render_into(terse, out));
                }
            }
        })
    }
}

fn wrap(out: &mut String, parens: bool, inner: impl FnOnce(&mut String)) {
    if parens {
        out.push('(');
    }
    inner(out);
    if parens {
        out.push(')');
    }
}

impl Machine {
    /// Renders in the mode configured by [`crate::Options::terse`].
    pub fn render(&self, term: &Term) -> String {
        term.render(self.options().terse)
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render(!f.alternate()))
    }
}
