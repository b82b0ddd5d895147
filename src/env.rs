use std::ffi::OsStr;

use crate::{
    error::{Error, OptionFault, Result},
    options::OptFlags,
};

/// Base optimization flags, as a comma list.
pub const OPT_VAR: &str = "LMCC_OPT";
/// Multiplier on the optimization fixpoint budget.
pub const BUDGET_VAR: &str = "LMCC_BUDGET_FACTOR";

/// Base flags from the environment, if set.
pub fn opt_flags() -> Result<Option<OptFlags>> {
    let Some(value) = var(OPT_VAR) else {
        return Ok(None);
    };
    value
        .parse::<OptFlags>()
        .map(Some)
        .map_err(|_| malformed(OPT_VAR))
}

/// Budget factor from the environment, if set.
pub fn budget_factor() -> Result<Option<usize>> {
    let Some(value) = var(BUDGET_VAR) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<usize>()
        .map(Some)
        .map_err(|_| malformed(BUDGET_VAR))
}

fn malformed(name: &str) -> Error {
    Error::InvalidOption {
        key: name.to_owned(),
        reason: OptionFault::Malformed,
    }
}

fn var(name: impl AsRef<OsStr>) -> Option<String> {
    std::env::var(name.as_ref()).ok().filter(|v| !v.is_empty())
}
