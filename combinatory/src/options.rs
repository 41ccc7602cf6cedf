use std::num::NonZeroUsize;

/// Per-call budget for the searches that have to run terms to completion.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Limits {
    /// Reduction steps allowed for each `run` inside the search.
    pub max_steps: usize,
    /// Fresh probes that may be fed to a term before giving up.
    pub max_args: usize,
}

/// Defaults shared by everything a [`crate::Machine`] does.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Options {
    pub max_steps: usize,
    pub max_args: usize,
    pub max_convert: usize,
    pub terse: bool,
    pub strict: bool,
    pub settled_cache: NonZeroUsize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            max_args: 32,
            max_convert: 10_000,
            terse: true,
            strict: false,
            settled_cache: NonZeroUsize::new(4096).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl Options {
    pub fn limits(&self) -> Limits {
        Limits {
            max_steps: self.max_steps,
            max_args: self.max_args,
        }
    }
    pub fn with_max_steps(self, max_steps: usize) -> Self {
        Self { max_steps, ..self }
    }
    pub fn with_max_args(self, max_args: usize) -> Self {
        Self { max_args, ..self }
    }
    pub fn with_max_convert(self, max_convert: usize) -> Self {
        Self {
            max_convert,
            ..self
        }
    }
    pub fn with_terse(self, terse: bool) -> Self {
        Self { terse, ..self }
    }
    pub fn with_strict(self, strict: bool) -> Self {
        Self { strict, ..self }
    }
    pub fn with_settled_cache(self, settled_cache: NonZeroUsize) -> Self {
        Self {
            settled_cache,
            ..self
        }
    }
}
