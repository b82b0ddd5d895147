use std::fmt::{self, Display};

use log::{debug, info};
use miette::{Diagnostic, Severity};

use crate::{
    air::Air,
    emit::Emitter,
    env,
    error::Result,
    ir::Unit,
    mailbox::MailboxAllocator,
    options::{OptFlags, OptionResolver},
    opt::Pipeline,
    program::Program,
};

/// Settings for one compilation session. Passed by value, never global.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Config {
    /// Passes enabled before any directive is seen
    pub flags: OptFlags,
    /// Multiplier on the optimization budget. Zero disables optimization with a warning.
    pub budget_factor: usize,
}

impl Config {
    pub fn new(flags: OptFlags) -> Self {
        Config {
            flags,
            ..Self::default()
        }
    }

    /// Defaults overridden by `LMCC_OPT` and `LMCC_BUDGET_FACTOR` where set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(flags) = env::opt_flags()? {
            config.flags = flags;
        }
        if let Some(factor) = env::budget_factor()? {
            config.budget_factor = factor;
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            flags: OptFlags::NONE,
            budget_factor: 1,
        }
    }
}

/// Non-fatal event. The program is still produced and still correct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// The fixed-point loop stopped after `budget` pass applications.
    OptimizationBudgetExceeded { budget: usize },
}

impl std::error::Error for Warning {}

impl Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OptimizationBudgetExceeded { budget } => write!(
                f,
                "Optimization stopped after {budget} pass applications"
            ),
        }
    }
}

impl Diagnostic for Warning {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        match self {
            Self::OptimizationBudgetExceeded { .. } => Some(Box::new("opt::budget_exceeded")),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        match self {
            Self::OptimizationBudgetExceeded { .. } => Some(Box::new(
                "the program is correct but may be larger than necessary",
            )),
        }
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Warning)
    }
}

/// Result of a successful compilation.
#[derive(Clone, Debug)]
pub struct Compiled {
    pub program: Program,
    /// Flags the pipeline actually ran with
    pub flags: OptFlags,
    pub warnings: Vec<Warning>,
}

/// Drives one unit through option resolution, emission, optimization and layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct Compiler {
    config: Config,
}

impl Compiler {
    pub fn new(config: Config) -> Self {
        Compiler { config }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Compile a unit. Fatal errors return no program at all.
    pub fn compile(&self, unit: &Unit) -> Result<Compiled> {
        let flags = self.flags(unit)?;
        let (air, mailboxes) = Emitter::new().lower(unit)?;
        let mut warnings = Vec::new();
        let air = self.optimize(air, flags, &mut warnings);
        let program = Self::layout(&air, &mailboxes)?;
        info!(
            "compiled {} words ({} code, {} data) with {flags}",
            program.len(),
            program.code_len(),
            program.data_len()
        );
        Ok(Compiled {
            program,
            flags,
            warnings,
        })
    }

    /// Base flags OR every directive in the unit. Fixed before emission starts.
    pub fn flags(&self, unit: &Unit) -> Result<OptFlags> {
        let mut resolver = OptionResolver::new(self.config.flags);
        resolver.scan(&unit.body)?;
        let flags = resolver.finish();
        debug!("optimization flags: {flags}");
        Ok(flags)
    }

    fn optimize(&self, air: Air, flags: OptFlags, warnings: &mut Vec<Warning>) -> Air {
        Pipeline::new(flags, self.config.budget_factor).run(air, warnings)
    }

    fn layout(air: &Air, mailboxes: &MailboxAllocator) -> Result<Program> {
        air.backpatch(mailboxes)
    }
}

/// Compile with [`Config::default`].
pub fn compile(unit: &Unit) -> Result<Compiled> {
    Compiler::default().compile(unit)
}
