use log::trace;

use crate::{
    error::{Error, Result},
    symbol::{FxMap, Mailbox, Word, MEMORY_SIZE, WORD_MAX},
};

/// What a mailbox slot was allocated for.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Slot {
    /// Scratch mailbox at id 0.
    Temp,
    /// Named source variable.
    Var(String),
    /// Intermediate value of a compound expression.
    Temporary,
    /// Holds a literal, since LMC has no immediate operands.
    Const(Word),
}

impl Slot {
    /// Initial value for the `DAT` word backing this slot.
    pub fn init(&self) -> Word {
        match self {
            Slot::Const(val) => *val,
            Slot::Temp | Slot::Var(_) | Slot::Temporary => 0,
        }
    }
}

/// Hands out mailbox slots for one compilation unit.
///
/// Id 0 is reserved for TEMP and only materialised on first use. Everything else is numbered
/// from 1 upwards in allocation order and never recycled.
#[derive(Debug)]
pub struct MailboxAllocator {
    /// Symbol table of variable name -> mailbox
    symbols: FxMap<String, Mailbox>,
    /// Constant pool of value -> mailbox
    constants: FxMap<Word, Mailbox>,
    /// Indexed by mailbox id
    slots: Vec<Option<Slot>>,
}

impl MailboxAllocator {
    pub fn new() -> Self {
        MailboxAllocator {
            symbols: FxMap::default(),
            constants: FxMap::default(),
            slots: vec![None],
        }
    }

    /// Mailbox for a variable being written. Allocates on first use.
    pub fn allocate(&mut self, name: &str) -> Result<Mailbox> {
        if let Some(&mailbox) = self.symbols.get(name) {
            return Ok(mailbox);
        }
        let mailbox = self.push(Slot::Var(name.to_owned()))?;
        self.symbols.insert(name.to_owned(), mailbox);
        trace!("allocated `{name}` at {mailbox}");
        Ok(mailbox)
    }

    /// Mailbox for a variable being read.
    pub fn lookup(&self, name: &str) -> Result<Mailbox> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| Error::UndefinedSymbol {
                name: name.to_owned(),
            })
    }

    /// Reserve TEMP if it does not exist yet.
    pub fn temp(&mut self) -> Mailbox {
        if self.slots[0].is_none() {
            trace!("reserved TEMP");
            self.slots[0] = Some(Slot::Temp);
        }
        Mailbox::TEMP
    }

    /// Fresh unnamed mailbox for an intermediate value.
    pub fn temporary(&mut self) -> Result<Mailbox> {
        self.push(Slot::Temporary)
    }

    /// Mailbox holding `value`, shared by every use of the same value.
    pub fn constant(&mut self, value: i64) -> Result<Mailbox> {
        if !(-(WORD_MAX as i64)..=WORD_MAX as i64).contains(&value) {
            return Err(Error::ValueOutOfRange { value });
        }
        let value = value as Word;
        if let Some(&mailbox) = self.constants.get(&value) {
            return Ok(mailbox);
        }
        let mailbox = self.push(Slot::Const(value))?;
        self.constants.insert(value, mailbox);
        Ok(mailbox)
    }

    pub fn slot(&self, mailbox: Mailbox) -> Option<&Slot> {
        self.slots.get(mailbox.id()).and_then(Option::as_ref)
    }

    /// Allocated slots in id order.
    pub fn slots(&self) -> impl Iterator<Item = (Mailbox, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|slot| (Mailbox::new(id), slot)))
    }

    /// Variable name -> mailbox, in allocation order.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, Mailbox)> {
        self.symbols.iter().map(|(name, &mailbox)| (name.as_str(), mailbox))
    }

    /// Number of slots in use, TEMP included if reserved.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, slot: Slot) -> Result<Mailbox> {
        let id = self.slots.len();
        if id >= MEMORY_SIZE {
            return Err(Error::OutOfMailboxes { requested: id + 1 });
        }
        self.slots.push(Some(slot));
        Ok(Mailbox::new(id))
    }
}

impl Default for MailboxAllocator {
    fn default() -> Self {
        Self::new()
    }
}
