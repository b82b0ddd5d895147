use log::trace;

use super::Pass;
use crate::{
    air::{Air, AirStmt},
    options::OptFlags,
    symbol::{Flag, MailboxSet},
};

/// Reuses the value already in the accumulator inside straight-line blocks.
///
/// Tracks which mailboxes currently hold the same value as the accumulator. Loading one of
/// them, or storing into one of them, changes nothing and is dropped.
pub struct Bprop;

impl Pass for Bprop {
    fn flag(&self) -> OptFlags {
        OptFlags::BPROP
    }

    fn name(&self) -> &'static str {
        "bprop"
    }

    fn run(&self, air: &Air) -> Air {
        let mut kept = Vec::with_capacity(air.len());
        let mut same = MailboxSet::EMPTY;

        for &stmt in air.stmts() {
            match stmt {
                AirStmt::Lda(m) | AirStmt::Sta(m) if same.contains(m) => {
                    trace!("bprop: dropped {stmt}");
                    continue;
                }
                AirStmt::Lda(m) => same = MailboxSet::single(m),
                AirStmt::Sta(m) => same.insert(m),
                AirStmt::Out => {}
                AirStmt::Branch(flag, _) if flag != Flag::Always => {}
                AirStmt::Mark(_)
                | AirStmt::Branch(..)
                | AirStmt::Hlt
                | AirStmt::Inp
                | AirStmt::Add(_)
                | AirStmt::Sub(_) => same = MailboxSet::EMPTY,
            }
            kept.push(stmt);
        }
        air.with_stmts(kept)
    }
}
