//! Control flow and mailbox liveness over an [`Air`] list.
//!
//! Every statement is its own node. Lists are at most a few hundred statements long, so the
//! dataflow is solved by plain backward sweeps until nothing changes.

use crate::{
    air::{Air, AirStmt},
    symbol::{Flag, Label, MailboxSet},
};

/// Statement index of each label's mark, indexed by label.
pub fn label_positions(air: &Air) -> Vec<Option<usize>> {
    let mut positions = vec![None; air.label_count()];
    for (idx, stmt) in air.stmts().iter().enumerate() {
        if let AirStmt::Mark(label) = stmt {
            if let Some(slot) = positions.get_mut(label.idx()) {
                *slot = Some(idx);
            }
        }
    }
    positions
}

/// Labels targeted by at least one branch, indexed by label.
pub fn referenced_labels(air: &Air) -> Vec<bool> {
    let mut referenced = vec![false; air.label_count()];
    for label in air.stmts().iter().filter_map(|stmt| stmt.target()) {
        if let Some(slot) = referenced.get_mut(label.idx()) {
            *slot = true;
        }
    }
    referenced
}

/// Statements control may pass to after `idx`. `HLT` and the end of the list have none.
pub fn successors(air: &Air, positions: &[Option<usize>], idx: usize) -> Vec<usize> {
    let next = Some(idx + 1).filter(|&next| next < air.len());
    let target = |label: Label| positions.get(label.idx()).copied().flatten();
    match *air.get(idx) {
        AirStmt::Hlt => vec![],
        AirStmt::Branch(Flag::Always, label) => target(label).into_iter().collect(),
        AirStmt::Branch(_, label) => next.into_iter().chain(target(label)).collect(),
        _ => next.into_iter().collect(),
    }
}

/// Mailboxes whose current value may still be read, after each statement.
#[derive(Debug)]
pub struct Liveness {
    live_out: Vec<MailboxSet>,
}

impl Liveness {
    pub fn compute(air: &Air) -> Self {
        let positions = label_positions(air);
        let succs: Vec<Vec<usize>> = (0..air.len())
            .map(|idx| successors(air, &positions, idx))
            .collect();

        let mut live_in = vec![MailboxSet::EMPTY; air.len()];
        let mut live_out = vec![MailboxSet::EMPTY; air.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for idx in (0..air.len()).rev() {
                let out = succs[idx]
                    .iter()
                    .fold(MailboxSet::EMPTY, |acc, &succ| acc.union(live_in[succ]));

                // live_in = use ∪ (live_out - def)
                let stmt = *air.get(idx);
                let mut entry = out;
                if let AirStmt::Sta(m) = stmt {
                    entry.remove(m);
                }
                if let Some(m) = stmt.reads() {
                    entry.insert(m);
                }

                if out != live_out[idx] || entry != live_in[idx] {
                    live_out[idx] = out;
                    live_in[idx] = entry;
                    changed = true;
                }
            }
        }
        Liveness { live_out }
    }

    pub fn live_out(&self, idx: usize) -> MailboxSet {
        self.live_out[idx]
    }
}
