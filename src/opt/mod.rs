//! Optimization pipeline over the [`Air`] list.
//!
//! Every pass only removes statements and keeps the input/output behaviour of the program.
//! Passes run in a fixed order, each gated by its own bit in [`OptFlags`], and the whole
//! sequence is repeated until a round changes nothing.

mod bprop;
mod clean;
pub mod flow;
mod thrashing;

use log::{debug, warn};

pub use bprop::Bprop;
pub use clean::Clean;
pub use thrashing::Thrashing;

use crate::{air::Air, compile::Warning, options::OptFlags};

/// A single rewrite from instruction list to instruction list.
pub trait Pass {
    /// Bit that enables this pass.
    fn flag(&self) -> OptFlags;
    fn name(&self) -> &'static str;
    fn run(&self, air: &Air) -> Air;
}

/// Every pass in the order it runs.
pub const PASSES: [&dyn Pass; 3] = [&Thrashing, &Clean, &Bprop];

/// Runs the enabled passes to a fixed point under a budget.
///
/// Every round that changes something removes at least one statement, so a factor of 1 or
/// more always reaches the fixed point first. [`Pipeline::with_budget`] sets a hard cap
/// that can stop between passes.
#[derive(Clone, Copy, Debug)]
pub struct Pipeline {
    flags: OptFlags,
    budget_factor: usize,
    /// Fixed number of pass applications, replacing the derived budget
    fixed: Option<usize>,
}

impl Pipeline {
    pub fn new(flags: OptFlags, budget_factor: usize) -> Self {
        Pipeline {
            flags,
            budget_factor,
            fixed: None,
        }
    }

    /// Allow exactly `budget` pass applications whatever the list length.
    pub fn with_budget(self, budget: usize) -> Self {
        Pipeline {
            fixed: Some(budget),
            ..self
        }
    }

    /// Most pass applications allowed for a list of `len` statements.
    pub fn budget(&self, len: usize) -> usize {
        self.fixed.unwrap_or_else(|| {
            (len + 1)
                .saturating_mul(self.flags.count())
                .saturating_mul(self.budget_factor)
        })
    }

    /// Optimize `air`. Running out of budget returns the list as it stands and records a
    /// warning.
    pub fn run(&self, air: Air, warnings: &mut Vec<Warning>) -> Air {
        let enabled: Vec<&dyn Pass> = PASSES
            .into_iter()
            .filter(|pass| self.flags.contains(pass.flag()))
            .collect();
        if enabled.is_empty() {
            return air;
        }

        let budget = self.budget(air.len());
        let mut air = air;
        let mut applied = 0;
        let mut round = 0;
        loop {
            let mut changed = false;
            for pass in &enabled {
                if applied >= budget {
                    warn!("optimization budget of {budget} pass applications exceeded");
                    warnings.push(Warning::OptimizationBudgetExceeded { budget });
                    return air;
                }
                let next = pass.run(&air);
                applied += 1;
                if next != air {
                    debug!(
                        "round {round}: {} {} -> {} statements",
                        pass.name(),
                        air.len(),
                        next.len()
                    );
                    air = next;
                    changed = true;
                }
            }
            if !changed {
                return air;
            }
            round += 1;
        }
    }
}
