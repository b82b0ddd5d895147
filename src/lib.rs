// Source side
pub mod ir;
pub use ir::Unit;
mod builtin;
pub use builtin::{types, Builtin};

// Storage and options
mod mailbox;
pub use mailbox::{MailboxAllocator, Slot};
mod options;
pub use options::{OptFlags, OptionResolver};

// Lowering
mod emit;
pub use emit::Emitter;
mod air;
pub use air::{Air, AirStmt};
pub mod opt;

// Output
mod program;
pub use program::{Cell, Instr, Program};
mod symbol;
pub use symbol::{Addr, Flag, Label, Mailbox, MailboxSet, Word, MEMORY_SIZE, WORD_MAX};

// Session
mod compile;
pub use compile::{compile, Compiled, Compiler, Config, Warning};

mod error;
pub use error::{Error, OptionFault, Result};

pub mod env;
