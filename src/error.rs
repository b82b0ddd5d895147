use std::fmt::{self, Display};

use miette::{Diagnostic, Severity};

use crate::symbol::{Label, MEMORY_SIZE};

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal compilation error. Compilation stops and no artifact is produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// More than 100 words would be needed.
    OutOfMailboxes {
        requested: usize,
    },
    /// Variable read before anything was stored to it.
    UndefinedSymbol {
        name: String,
    },
    InvalidOption {
        key: String,
        reason: OptionFault,
    },
    /// Branch to a label that was never placed. Indicates an emitter defect.
    UnresolvedLabel {
        label: Label,
    },
    ValueOutOfRange {
        value: i64,
    },
    UnknownBuiltin {
        name: String,
    },
    BadCall {
        callee: &'static str,
        reason: String,
    },
    /// Word is not the canonical encoding of any instruction.
    InvalidWord {
        word: i64,
    },
}

/// Why an option directive was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionFault {
    UnknownKey,
    KeyNotLiteral,
    NotConstant,
    MissingArgument,
    Malformed,
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMailboxes { requested } => write!(
                f,
                "Program needs {requested} mailboxes but only {MEMORY_SIZE} exist"
            ),
            Self::UndefinedSymbol { name } => {
                write!(f, "Variable `{name}` is read before it is defined")
            }
            Self::InvalidOption { key, reason } => {
                write!(f, "Invalid compiler option `{key}`: {reason}")
            }
            Self::UnresolvedLabel { label } => {
                write!(f, "Branch target {label} was never placed")
            }
            Self::ValueOutOfRange { value } => {
                write!(f, "Value {value} does not fit in a mailbox")
            }
            Self::UnknownBuiltin { name } => write!(f, "Unknown builtin function `{name}`"),
            Self::BadCall { callee, reason } => {
                write!(f, "Invalid call to `{callee}`: {reason}")
            }
            Self::InvalidWord { word } => write!(f, "Word {word} is not a valid instruction"),
        }
    }
}

impl Display for OptionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey => write!(f, "not a recognised option"),
            Self::KeyNotLiteral => write!(f, "key must be a string literal"),
            Self::NotConstant => write!(f, "value must be an integer literal"),
            Self::MissingArgument => write!(f, "expected a key and a value"),
            Self::Malformed => write!(f, "could not parse value"),
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        let code = match self {
            Self::OutOfMailboxes { .. } => "alloc::out_of_mailboxes",
            Self::UndefinedSymbol { .. } => "alloc::undefined_symbol",
            Self::InvalidOption { .. } => "option::invalid",
            Self::UnresolvedLabel { .. } => "layout::unresolved_label",
            Self::ValueOutOfRange { .. } => "alloc::value_range",
            Self::UnknownBuiltin { .. } => "emit::unknown_builtin",
            Self::BadCall { .. } => "emit::bad_call",
            Self::InvalidWord { .. } => "decode::invalid_word",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        let help = match self {
            Self::OutOfMailboxes { .. } => {
                "reduce the number of variables or enable optimizations to shrink the program"
            }
            Self::UndefinedSymbol { .. } => "assign or input the variable before using it",
            Self::InvalidOption { .. } => {
                "valid keys are \"thrashing\", \"clean\", \"bprop\", \"all\" and \"none\""
            }
            Self::UnresolvedLabel { .. } => "this is a compiler bug, please report it",
            Self::ValueOutOfRange { .. } => "mailboxes hold values from -999 to 999",
            Self::UnknownBuiltin { .. } => {
                "available builtins are _hlt, _inp, _out, _sta, input, output and __lmc_option__"
            }
            Self::BadCall { .. } => "check the number and kind of arguments",
            Self::InvalidWord { .. } => "instructions are encoded as opcode * 100 + operand",
        };
        Some(Box::new(help))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }
}
