use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use log::debug;

use crate::{
    error::{Error, OptionFault, Result},
    ir::{Arg, Expr, Stmt},
};

/// Set of enabled optimization passes.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Debug)]
pub struct OptFlags(u8);

impl OptFlags {
    pub const NONE: OptFlags = OptFlags(0);
    pub const THRASHING: OptFlags = OptFlags(0b001);
    pub const CLEAN: OptFlags = OptFlags(0b010);
    pub const BPROP: OptFlags = OptFlags(0b100);
    pub const ALL: OptFlags = OptFlags(0b111);

    const NAMED: [(&'static str, OptFlags); 3] = [
        ("thrashing", Self::THRASHING),
        ("clean", Self::CLEAN),
        ("bprop", Self::BPROP),
    ];

    /// Flags named by a directive key.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "all" => Some(Self::ALL),
            "none" => Some(Self::NONE),
            _ => Self::NAMED
                .into_iter()
                .find(|(name, _)| *name == key)
                .map(|(_, flag)| flag),
        }
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of passes enabled.
    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Every subset of [`OptFlags::ALL`].
    pub fn subsets() -> impl Iterator<Item = OptFlags> {
        (0..=Self::ALL.0).map(OptFlags)
    }
}

impl BitOr for OptFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        OptFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for OptFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromStr for OptFlags {
    type Err = String;
    fn from_str(string: &str) -> std::result::Result<Self, Self::Err> {
        let mut flags = Self::default();
        for word in string.split(',') {
            let word = word.trim();
            if word.is_empty() {
                continue;
            }
            let Some(flag) = Self::from_key(word) else {
                return Err(format!("Unknown optimization '{}'", word));
            };
            if !flag.is_empty() && flags.contains(flag) {
                return Err(format!("Cannot specify optimization '{}' twice", word));
            }
            flags |= flag;
        }
        Ok(flags)
    }
}

impl fmt::Display for OptFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut has_any_flag = false;
        for (name, flag) in Self::NAMED {
            if !self.contains(flag) {
                continue;
            }
            if has_any_flag {
                write!(f, ",")?;
            }
            write!(f, "{}", name)?;
            has_any_flag = true;
        }
        Ok(())
    }
}

/// Accumulates option directives for one compilation unit.
///
/// Directives combine by OR. Once [`OptionResolver::finish`] is called the flags are fixed.
#[derive(Debug, Default)]
pub struct OptionResolver {
    flags: OptFlags,
}

impl OptionResolver {
    /// Start from base flags, usually taken from [`Config`](crate::Config).
    pub fn new(base: OptFlags) -> Self {
        OptionResolver { flags: base }
    }

    /// Flag bits for one directive. A zero value contributes nothing.
    pub fn resolve(key: &str, value: &Arg) -> Result<OptFlags> {
        let fault = |reason| Error::InvalidOption {
            key: key.to_owned(),
            reason,
        };
        let flag = OptFlags::from_key(key).ok_or_else(|| fault(OptionFault::UnknownKey))?;
        match value {
            Arg::Expr(Expr::Const(0)) => Ok(OptFlags::NONE),
            Arg::Expr(Expr::Const(_)) => Ok(flag),
            _ => Err(fault(OptionFault::NotConstant)),
        }
    }

    /// Fold a `__lmc_option__(key, value)` argument list into the flags.
    pub fn directive(&mut self, args: &[Arg]) -> Result<()> {
        let (key, value) = match args {
            [Arg::Str(key), value] => (key, value),
            [key, _] => {
                return Err(Error::InvalidOption {
                    key: format!("{key:?}"),
                    reason: OptionFault::KeyNotLiteral,
                })
            }
            _ => {
                return Err(Error::InvalidOption {
                    key: String::new(),
                    reason: OptionFault::MissingArgument,
                })
            }
        };
        let flag = Self::resolve(key, value)?;
        debug!("option `{key}` contributes {flag}");
        self.flags |= flag;
        Ok(())
    }

    /// Visit every directive in a statement list, including nested bodies.
    pub fn scan(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            match stmt {
                Stmt::Call { callee, args } if callee == "__lmc_option__" => {
                    self.directive(args)?
                }
                Stmt::If {
                    then_body,
                    else_body,
                    ..
                } => {
                    self.scan(then_body)?;
                    self.scan(else_body)?;
                }
                Stmt::While { body, .. } => self.scan(body)?,
                Stmt::Assign { .. } | Stmt::Call { .. } => {}
            }
        }
        Ok(())
    }

    /// Freeze the accumulated flags.
    pub fn finish(self) -> OptFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Cond, CmpOp};

    #[test]
    fn parse_list() {
        assert_eq!("".parse::<OptFlags>(), Ok(OptFlags::NONE));
        assert_eq!(
            "thrashing,clean".parse::<OptFlags>(),
            Ok(OptFlags::THRASHING | OptFlags::CLEAN)
        );
        assert_eq!("all".parse::<OptFlags>(), Ok(OptFlags::ALL));
        assert!("thrashing,thrashing".parse::<OptFlags>().is_err());
        assert!("fast".parse::<OptFlags>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(OptFlags::NONE.to_string(), "none");
        assert_eq!(OptFlags::ALL.to_string(), "thrashing,clean,bprop");
        assert_eq!((OptFlags::BPROP | OptFlags::THRASHING).to_string(), "thrashing,bprop");
    }

    #[test]
    fn resolve_keys() {
        let one = Arg::Expr(Expr::Const(1));
        assert_eq!(OptionResolver::resolve("clean", &one), Ok(OptFlags::CLEAN));
        assert_eq!(OptionResolver::resolve("all", &one), Ok(OptFlags::ALL));
        assert_eq!(OptionResolver::resolve("none", &one), Ok(OptFlags::NONE));
        assert_eq!(
            OptionResolver::resolve("bprop", &Arg::Expr(Expr::Const(0))),
            Ok(OptFlags::NONE)
        );
        assert_eq!(
            OptionResolver::resolve("CLEAN", &one),
            Err(Error::InvalidOption {
                key: "CLEAN".into(),
                reason: OptionFault::UnknownKey
            })
        );
    }

    #[test]
    fn rejects_non_constant_value() {
        let value = Arg::Expr(Expr::var("x"));
        assert_eq!(
            OptionResolver::resolve("clean", &value),
            Err(Error::InvalidOption {
                key: "clean".into(),
                reason: OptionFault::NotConstant
            })
        );
        let value = Arg::Expr(Expr::add(Expr::Const(1), Expr::Const(1)));
        assert!(OptionResolver::resolve("clean", &value).is_err());
    }

    #[test]
    fn directives_or_combine() {
        let mut resolver = OptionResolver::new(OptFlags::BPROP);
        let body = vec![
            Stmt::option("thrashing", 1),
            Stmt::While {
                cond: Cond::new(CmpOp::Gt, Expr::Const(1), Expr::Const(0)),
                body: vec![Stmt::option("clean", 1)],
            },
            // A later zero never clears earlier bits
            Stmt::option("thrashing", 0),
        ];
        resolver.scan(&body).unwrap();
        assert_eq!(resolver.finish(), OptFlags::ALL);
    }

    #[test]
    fn directive_shape() {
        let mut resolver = OptionResolver::default();
        assert!(matches!(
            resolver.directive(&[Arg::Str("clean".into())]),
            Err(Error::InvalidOption {
                reason: OptionFault::MissingArgument,
                ..
            })
        ));
        assert!(matches!(
            resolver.directive(&[Arg::Expr(Expr::Const(1)), Arg::Expr(Expr::Const(1))]),
            Err(Error::InvalidOption {
                reason: OptionFault::KeyNotLiteral,
                ..
            })
        ));
    }
}
