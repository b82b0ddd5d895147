use std::fmt;

use crate::{
    error::{Error, Result},
    symbol::{Addr, Flag, FxMap, Word},
};

/// Resolved LMC instruction with numeric operands.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Instr {
    Hlt,
    Add(Addr),
    Sub(Addr),
    Sta(Addr),
    Lda(Addr),
    Br(Flag, Addr),
    Inp,
    Out,
}

impl Instr {
    /// Encode as `opcode * 100 + operand`.
    pub fn encode(self) -> Word {
        let (opcode, operand) = match self {
            Instr::Hlt => (0, 0),
            Instr::Add(addr) => (1, addr.get()),
            Instr::Sub(addr) => (2, addr.get()),
            Instr::Sta(addr) => (3, addr.get()),
            Instr::Lda(addr) => (5, addr.get()),
            Instr::Br(Flag::Always, addr) => (6, addr.get()),
            Instr::Br(Flag::Zero, addr) => (7, addr.get()),
            Instr::Br(Flag::Positive, addr) => (8, addr.get()),
            Instr::Inp => (9, 1),
            Instr::Out => (9, 2),
        };
        opcode * 100 + operand as Word
    }

    /// Decode a canonical instruction word.
    pub fn decode(word: Word) -> Result<Self> {
        let invalid = || Error::InvalidWord { word: word as i64 };
        if !(0..=999).contains(&word) {
            return Err(invalid());
        }
        let operand = Addr::new((word % 100) as usize).ok_or_else(invalid)?;
        let instr = match (word / 100, operand.get()) {
            (0, 0) => Instr::Hlt,
            (1, _) => Instr::Add(operand),
            (2, _) => Instr::Sub(operand),
            (3, _) => Instr::Sta(operand),
            (5, _) => Instr::Lda(operand),
            (6, _) => Instr::Br(Flag::Always, operand),
            (7, _) => Instr::Br(Flag::Zero, operand),
            (8, _) => Instr::Br(Flag::Positive, operand),
            (9, 1) => Instr::Inp,
            (9, 2) => Instr::Out,
            _ => return Err(invalid()),
        };
        Ok(instr)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Instr::Hlt => "HLT",
            Instr::Add(_) => "ADD",
            Instr::Sub(_) => "SUB",
            Instr::Sta(_) => "STA",
            Instr::Lda(_) => "LDA",
            Instr::Br(flag, _) => flag.mnemonic(),
            Instr::Inp => "INP",
            Instr::Out => "OUT",
        }
    }

    pub fn operand(self) -> Option<Addr> {
        match self {
            Instr::Add(addr)
            | Instr::Sub(addr)
            | Instr::Sta(addr)
            | Instr::Lda(addr)
            | Instr::Br(_, addr) => Some(addr),
            Instr::Hlt | Instr::Inp | Instr::Out => None,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand() {
            Some(addr) => write!(f, "{} {}", self.mnemonic(), addr),
            None => f.write_str(self.mnemonic()),
        }
    }
}

/// Single word of the final memory image.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cell {
    Instr(Instr),
    /// `DAT` with its initial value
    Data(Word),
}

impl Cell {
    pub fn encode(self) -> Word {
        match self {
            Cell::Instr(instr) => instr.encode(),
            Cell::Data(val) => val,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Instr(instr) => write!(f, "{instr}"),
            Cell::Data(val) => write!(f, "DAT {val}"),
        }
    }
}

/// Finalised program: code from address 0 followed by data.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Program {
    cells: Vec<Cell>,
    code_len: usize,
    /// Variable name -> final address
    symbols: FxMap<String, Addr>,
}

impl Program {
    pub(crate) fn new(cells: Vec<Cell>, code_len: usize, symbols: FxMap<String, Addr>) -> Self {
        Program {
            cells,
            code_len,
            symbols,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Instructions only, without the trailing data.
    pub fn code(&self) -> impl Iterator<Item = Instr> + '_ {
        self.cells[..self.code_len].iter().filter_map(|cell| match cell {
            Cell::Instr(instr) => Some(*instr),
            Cell::Data(_) => None,
        })
    }

    pub fn code_len(&self) -> usize {
        self.code_len
    }

    pub fn data_len(&self) -> usize {
        self.cells.len() - self.code_len
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Encoded memory image, one word per address.
    pub fn words(&self) -> Vec<Word> {
        self.cells.iter().map(|cell| cell.encode()).collect()
    }

    /// Final address of a named variable, if it survived optimization.
    pub fn symbol(&self, name: &str) -> Option<Addr> {
        self.symbols.get(name).copied()
    }

    /// Surviving variables in allocation order.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, Addr)> {
        self.symbols.iter().map(|(name, addr)| (name.as_str(), *addr))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (addr, cell) in self.cells.iter().enumerate() {
            writeln!(f, "{addr:02} {cell}")?;
        }
        Ok(())
    }
}
