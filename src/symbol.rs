use std::fmt;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

// Symbol tables keep insertion order so listings are deterministic
pub(crate) type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Number of addressable words in LMC memory.
pub const MEMORY_SIZE: usize = 100;

/// Largest magnitude a mailbox can hold.
pub const WORD_MAX: Word = 999;

/// Value held by a single mailbox.
pub type Word = i16;

/// Slot handed out by the mailbox allocator. Resolved to an [`Addr`] during backpatching.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Mailbox(u8);

impl Mailbox {
    /// Scratch mailbox used to stage values for output.
    pub const TEMP: Mailbox = Mailbox(0);

    pub(crate) fn new(id: usize) -> Self {
        debug_assert!(id < MEMORY_SIZE);
        Mailbox(id as u8)
    }

    pub fn id(self) -> usize {
        self.0 as usize
    }

    pub fn is_temp(self) -> bool {
        self == Self::TEMP
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_temp() {
            f.write_str("TEMP")
        } else {
            write!(f, "m{}", self.0)
        }
    }
}

/// Symbolic branch target, an index into the label arena of an [`Air`](crate::Air).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Label(u32);

impl Label {
    pub(crate) fn new(idx: usize) -> Self {
        Label(idx as u32)
    }

    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Newtype representing an address inside the LMC memory.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Addr(u8);

impl Addr {
    /// Returns `None` when outside of `0..=99`.
    pub fn new(val: usize) -> Option<Self> {
        (val < MEMORY_SIZE).then_some(Addr(val as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// Accumulator condition under which a branch is taken.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Flag {
    /// Unconditional
    Always,
    /// == 0
    Zero,
    /// >= 0
    Positive,
}

impl Flag {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Flag::Always => "BRA",
            Flag::Zero => "BRZ",
            Flag::Positive => "BRP",
        }
    }
}

/// Set of mailboxes, one bit per slot.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Debug)]
pub struct MailboxSet(u128);

impl MailboxSet {
    pub const EMPTY: MailboxSet = MailboxSet(0);

    pub fn single(mailbox: Mailbox) -> Self {
        MailboxSet(1u128 << mailbox.id())
    }

    pub fn contains(self, mailbox: Mailbox) -> bool {
        self.0 & (1u128 << mailbox.id()) != 0
    }

    pub fn insert(&mut self, mailbox: Mailbox) {
        self.0 |= 1u128 << mailbox.id();
    }

    pub fn remove(&mut self, mailbox: Mailbox) {
        self.0 &= !(1u128 << mailbox.id());
    }

    pub fn union(self, other: Self) -> Self {
        MailboxSet(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in ascending id order.
    pub fn iter(self) -> impl Iterator<Item = Mailbox> {
        (0..MEMORY_SIZE)
            .filter(move |id| self.0 & (1u128 << id) != 0)
            .map(Mailbox::new)
    }
}

impl FromIterator<Mailbox> for MailboxSet {
    fn from_iter<T: IntoIterator<Item = Mailbox>>(iter: T) -> Self {
        let mut set = MailboxSet::EMPTY;
        for mailbox in iter {
            set.insert(mailbox);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_bounds() {
        assert_eq!(Addr::new(0).map(Addr::get), Some(0));
        assert_eq!(Addr::new(99).map(Addr::get), Some(99));
        assert_eq!(Addr::new(100), None);
    }

    #[test]
    fn mailbox_set_ops() {
        let a = Mailbox::new(3);
        let b = Mailbox::new(99);
        let mut set = MailboxSet::single(a);
        set.insert(b);
        set.insert(Mailbox::TEMP);
        assert_eq!(set.len(), 3);
        assert!(set.contains(b));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Mailbox::TEMP, a, b]);

        set.remove(a);
        assert!(!set.contains(a));
        assert_eq!(set.union(MailboxSet::single(a)).len(), 3);
    }

    #[test]
    fn display() {
        assert_eq!(Mailbox::TEMP.to_string(), "TEMP");
        assert_eq!(Mailbox::new(12).to_string(), "m12");
        assert_eq!(Addr::new(7).unwrap().to_string(), "07");
        assert_eq!(Label::new(4).to_string(), "L4");
    }
}
