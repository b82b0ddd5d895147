use log::trace;

use super::Pass;
use crate::{
    air::{Air, AirStmt},
    options::OptFlags,
    symbol::{Flag, Mailbox},
};

/// Drops redundant load/store traffic between neighbouring statements.
///
/// Works on pairs with no mark in between, comparing each statement with the last one kept.
/// A load of the mailbox loaded most recently is also dropped when only `OUT`, `STA` or a
/// conditional branch sits in between.
pub struct Thrashing;

impl Thrashing {
    fn redundant(prev: AirStmt, cur: AirStmt) -> bool {
        use AirStmt::*;
        matches!(
            (prev, cur),
            (Sta(a), Lda(b)) | (Lda(a), Lda(b)) | (Lda(a), Sta(b)) | (Sta(a), Sta(b)) if a == b
        )
    }
}

impl Pass for Thrashing {
    fn flag(&self) -> OptFlags {
        OptFlags::THRASHING
    }

    fn name(&self) -> &'static str {
        "thrashing"
    }

    fn run(&self, air: &Air) -> Air {
        let mut kept = Vec::with_capacity(air.len());
        let mut prev: Option<AirStmt> = None;
        let mut loaded: Option<Mailbox> = None;

        for &stmt in air.stmts() {
            let drop = match stmt {
                AirStmt::Lda(m) if loaded == Some(m) => true,
                _ => prev.is_some_and(|prev| Self::redundant(prev, stmt)),
            };
            if drop {
                trace!("thrashing: dropped {stmt}");
                continue;
            }

            // Only kept statements move the window, so a second run sees the same pairs
            loaded = match stmt {
                AirStmt::Lda(m) => Some(m),
                AirStmt::Out | AirStmt::Sta(_) => loaded,
                AirStmt::Branch(flag, _) if flag != Flag::Always => loaded,
                _ => None,
            };
            prev = (!stmt.is_mark()).then_some(stmt);
            kept.push(stmt);
        }
        air.with_stmts(kept)
    }
}
