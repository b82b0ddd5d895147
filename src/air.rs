use std::fmt;

use log::debug;

use crate::{
    error::{Error, Result},
    mailbox::{MailboxAllocator, Slot},
    program::{Cell, Instr, Program},
    symbol::{Addr, Flag, FxMap, Label, Mailbox, MailboxSet, MEMORY_SIZE},
};

/// Assembly intermediate representation: symbolic instruction list plus the label arena.
///
/// Operands are mailbox slots and labels. Both are resolved to addresses by
/// [`Air::backpatch`] once the list is final.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Air {
    /// AIR
    stmts: Vec<AirStmt>,
    /// Number of labels created, each is an index into the backpatch table
    labels: usize,
}

/// Single LMC statement, or a label position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AirStmt {
    /// Stop execution
    Hlt,
    /// Read a number into the accumulator
    Inp,
    /// Write the accumulator
    Out,
    /// Load mailbox into the accumulator
    Lda(Mailbox),
    /// Store accumulator into mailbox
    Sta(Mailbox),
    /// Add mailbox to the accumulator
    Add(Mailbox),
    /// Subtract mailbox from the accumulator
    Sub(Mailbox),
    /// Branch on the accumulator
    Branch(Flag, Label),
    /// Position of a label. Occupies no memory.
    Mark(Label),
}

impl AirStmt {
    /// Mailbox named by this statement, if any.
    pub fn mailbox(self) -> Option<Mailbox> {
        match self {
            AirStmt::Lda(m) | AirStmt::Sta(m) | AirStmt::Add(m) | AirStmt::Sub(m) => Some(m),
            _ => None,
        }
    }

    /// Mailbox whose value this statement reads.
    pub fn reads(self) -> Option<Mailbox> {
        match self {
            AirStmt::Lda(m) | AirStmt::Add(m) | AirStmt::Sub(m) => Some(m),
            _ => None,
        }
    }

    /// Whether execution never continues to the next statement.
    pub fn ends_flow(self) -> bool {
        matches!(self, AirStmt::Hlt | AirStmt::Branch(Flag::Always, _))
    }

    pub fn target(self) -> Option<Label> {
        match self {
            AirStmt::Branch(_, label) => Some(label),
            _ => None,
        }
    }

    pub fn is_mark(self) -> bool {
        matches!(self, AirStmt::Mark(_))
    }
}

impl fmt::Display for AirStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AirStmt::Hlt => write!(f, "HLT"),
            AirStmt::Inp => write!(f, "INP"),
            AirStmt::Out => write!(f, "OUT"),
            AirStmt::Lda(m) => write!(f, "LDA {m}"),
            AirStmt::Sta(m) => write!(f, "STA {m}"),
            AirStmt::Add(m) => write!(f, "ADD {m}"),
            AirStmt::Sub(m) => write!(f, "SUB {m}"),
            AirStmt::Branch(flag, label) => write!(f, "{} {label}", flag.mnemonic()),
            AirStmt::Mark(label) => write!(f, "{label}:"),
        }
    }
}

impl Air {
    pub fn new() -> Self {
        Air {
            stmts: Vec::new(),
            labels: 0,
        }
    }

    /// Build from a statement list, sizing the label arena to fit every label it names.
    pub fn from_stmts(stmts: Vec<AirStmt>) -> Self {
        let labels = stmts
            .iter()
            .filter_map(|stmt| match stmt {
                AirStmt::Branch(_, label) | AirStmt::Mark(label) => Some(label.idx() + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        Air { stmts, labels }
    }

    /// Fresh label, not yet placed.
    pub fn new_label(&mut self) -> Label {
        let label = Label::new(self.labels);
        self.labels += 1;
        label
    }

    pub fn add_stmt(&mut self, stmt: AirStmt) {
        self.stmts.push(stmt)
    }

    /// Place `label` before the next statement.
    pub fn mark(&mut self, label: Label) {
        self.stmts.push(AirStmt::Mark(label))
    }

    pub fn get(&self, idx: usize) -> &AirStmt {
        &self.stmts[idx]
    }

    pub fn stmts(&self) -> &[AirStmt] {
        &self.stmts
    }

    /// Same label arena, new statements.
    pub fn with_stmts(&self, stmts: Vec<AirStmt>) -> Self {
        Air {
            stmts,
            labels: self.labels,
        }
    }

    /// Size of the label arena.
    pub fn label_count(&self) -> usize {
        self.labels
    }

    /// Total statements including marks.
    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Statements that occupy memory.
    pub fn code_len(&self) -> usize {
        self.stmts.iter().filter(|stmt| !stmt.is_mark()).count()
    }

    /// Every mailbox any statement refers to.
    pub fn mailboxes(&self) -> MailboxSet {
        self.stmts.iter().filter_map(|stmt| stmt.mailbox()).collect()
    }

    /// Lay out code then data and resolve every operand.
    ///
    /// Data words follow the code in mailbox id order. Only mailboxes still referenced are
    /// given a word.
    pub fn backpatch(&self, mailboxes: &MailboxAllocator) -> Result<Program> {
        // Use marks to fill the label table
        let mut table: Vec<Option<usize>> = vec![None; self.labels];
        let mut code_len = 0;
        for stmt in &self.stmts {
            match stmt {
                AirStmt::Mark(label) => table[label.idx()] = Some(code_len),
                _ => code_len += 1,
            }
        }

        let used = self.mailboxes();
        let total = code_len + used.len();
        if total > MEMORY_SIZE {
            return Err(Error::OutOfMailboxes { requested: total });
        }

        // Mailbox id -> final address
        let mut data_addrs = [None; MEMORY_SIZE];
        let mut cells = Vec::with_capacity(total);
        for (i, mailbox) in used.iter().enumerate() {
            data_addrs[mailbox.id()] = Addr::new(code_len + i);
        }

        let addr_of = |mailbox: Mailbox| -> Result<Addr> {
            data_addrs[mailbox.id()].ok_or(Error::OutOfMailboxes { requested: total })
        };
        let target_of = |label: Label| -> Result<Addr> {
            table
                .get(label.idx())
                .copied()
                .flatten()
                .and_then(Addr::new)
                .ok_or(Error::UnresolvedLabel { label })
        };

        for stmt in &self.stmts {
            let instr = match *stmt {
                AirStmt::Hlt => Instr::Hlt,
                AirStmt::Inp => Instr::Inp,
                AirStmt::Out => Instr::Out,
                AirStmt::Lda(m) => Instr::Lda(addr_of(m)?),
                AirStmt::Sta(m) => Instr::Sta(addr_of(m)?),
                AirStmt::Add(m) => Instr::Add(addr_of(m)?),
                AirStmt::Sub(m) => Instr::Sub(addr_of(m)?),
                AirStmt::Branch(flag, label) => Instr::Br(flag, target_of(label)?),
                AirStmt::Mark(_) => continue,
            };
            cells.push(Cell::Instr(instr));
        }
        for mailbox in used.iter() {
            let init = mailboxes.slot(mailbox).map_or(0, Slot::init);
            cells.push(Cell::Data(init));
        }

        let symbols: FxMap<String, Addr> = mailboxes
            .symbols()
            .filter_map(|(name, mailbox)| {
                let addr = data_addrs[mailbox.id()]?;
                Some((name.to_owned(), addr))
            })
            .collect();

        debug!(
            "laid out {code_len} instructions and {} data words",
            used.len()
        );
        Ok(Program::new(cells, code_len, symbols))
    }
}

impl fmt::Display for Air {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.stmts {
            match stmt {
                AirStmt::Mark(_) => writeln!(f, "{stmt}")?,
                _ => writeln!(f, "    {stmt}")?,
            }
        }
        Ok(())
    }
}
