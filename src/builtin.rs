use std::fmt;

/// Builtin functions the source language may call. Fixed ABI vocabulary.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Builtin {
    /// `_hlt()`: bare `HLT`
    Hlt,
    /// `_inp()`: bare `INP`
    Inp,
    /// `_out()`: bare `OUT`
    Out,
    /// `_sta(&place)`: store the accumulator
    Sta,
    /// `input(&place)`
    Input,
    /// `output(value)`
    Output,
    /// `__lmc_option__(key, value)`: compile-time directive, emits nothing
    Option,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::Hlt,
        Builtin::Inp,
        Builtin::Out,
        Builtin::Sta,
        Builtin::Input,
        Builtin::Output,
        Builtin::Option,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Hlt => "_hlt",
            Builtin::Inp => "_inp",
            Builtin::Out => "_out",
            Builtin::Sta => "_sta",
            Builtin::Input => "input",
            Builtin::Output => "output",
            Builtin::Option => "__lmc_option__",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Hlt | Builtin::Inp | Builtin::Out => 0,
            Builtin::Sta | Builtin::Input | Builtin::Output => 1,
            Builtin::Option => 2,
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.arity())
    }
}

/// Type aliases exposed to the source type checker. Booleans are plain numbers.
pub mod types {
    pub const NUMBER: &str = "number_t";
    pub const BOOLEAN: &str = "bool_t";
}
