use log::trace;

use super::{
    flow::{referenced_labels, Liveness},
    Pass,
};
use crate::{
    air::{Air, AirStmt},
    options::OptFlags,
};

/// Dead store and dead code elimination, repeated until the list stops shrinking.
pub struct Clean;

impl Clean {
    /// Stores whose value is never read on any path.
    fn dead_stores(air: &Air) -> Air {
        let live = Liveness::compute(air);
        let kept = air
            .stmts()
            .iter()
            .enumerate()
            .filter(|&(idx, stmt)| match *stmt {
                AirStmt::Sta(m) if !live.live_out(idx).contains(m) => {
                    trace!("clean: dead store {stmt}");
                    false
                }
                _ => true,
            })
            .map(|(_, stmt)| *stmt)
            .collect();
        air.with_stmts(kept)
    }

    /// Marks that no branch targets.
    fn unused_marks(air: &Air) -> Air {
        let referenced = referenced_labels(air);
        let kept = air
            .stmts()
            .iter()
            .copied()
            .filter(|stmt| match stmt {
                AirStmt::Mark(label) => referenced.get(label.idx()).copied().unwrap_or(false),
                _ => true,
            })
            .collect();
        air.with_stmts(kept)
    }

    /// Statements after `BRA` or `HLT` that no mark makes reachable again.
    fn unreachable(air: &Air) -> Air {
        let mut kept = Vec::with_capacity(air.len());
        let mut reachable = true;
        for &stmt in air.stmts() {
            if stmt.is_mark() {
                reachable = true;
            }
            if !reachable {
                trace!("clean: unreachable {stmt}");
                continue;
            }
            if stmt.ends_flow() {
                reachable = false;
            }
            kept.push(stmt);
        }
        air.with_stmts(kept)
    }

    /// Branches to a mark that directly follows, with only marks in between.
    fn fall_through(air: &Air) -> Air {
        let stmts = air.stmts();
        let kept = stmts
            .iter()
            .enumerate()
            .filter(|&(idx, stmt)| {
                let Some(target) = stmt.target() else {
                    return true;
                };
                let lands = stmts[idx + 1..]
                    .iter()
                    .take_while(|next| next.is_mark())
                    .any(|next| *next == AirStmt::Mark(target));
                if lands {
                    trace!("clean: fall-through {stmt}");
                }
                !lands
            })
            .map(|(_, stmt)| *stmt)
            .collect();
        air.with_stmts(kept)
    }
}

impl Pass for Clean {
    fn flag(&self) -> OptFlags {
        OptFlags::CLEAN
    }

    fn name(&self) -> &'static str {
        "clean"
    }

    fn run(&self, air: &Air) -> Air {
        let mut air = air.clone();
        loop {
            let next = Self::fall_through(&Self::unreachable(&Self::unused_marks(
                &Self::dead_stores(&air),
            )));
            if next == air {
                return air;
            }
            air = next;
        }
    }
}
