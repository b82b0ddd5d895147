use log::debug;

use crate::{
    air::{Air, AirStmt},
    builtin::Builtin,
    error::{Error, Result},
    ir::{Arg, BinOp, CmpOp, Cond, Expr, Place, Stmt, Unit},
    mailbox::MailboxAllocator,
    options::OptionResolver,
    symbol::{Flag, Label, Mailbox},
};

/// Lowers source IR into an [`Air`] list, allocating mailboxes as it goes.
///
/// Operands are evaluated left to right exactly as the IR orders them. Every value passes
/// through the accumulator.
pub struct Emitter {
    /// Assembly intermediate representation
    air: Air,
    /// Storage plan for the unit
    mailboxes: MailboxAllocator,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter {
            air: Air::new(),
            mailboxes: MailboxAllocator::new(),
        }
    }

    /// Lower a whole unit. The result always ends in `HLT`.
    pub fn lower(mut self, unit: &Unit) -> Result<(Air, MailboxAllocator)> {
        self.block(&unit.body)?;
        self.push(AirStmt::Hlt);
        debug!(
            "emitted {} statements using {} mailboxes",
            self.air.len(),
            self.mailboxes.len()
        );
        Ok((self.air, self.mailboxes))
    }

    fn push(&mut self, stmt: AirStmt) {
        self.air.add_stmt(stmt)
    }

    fn block(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Assign { dest, value } => {
                // Value first, so reading an undefined destination fails
                self.expr(value)?;
                let dest = self.dest(dest)?;
                self.push(AirStmt::Sta(dest));
            }
            Stmt::Call { callee, args } => self.call(callee, args)?,
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let on_true = self.air.new_label();
                let on_false = self.air.new_label();
                let end = self.air.new_label();
                self.cond(cond, on_true, on_false)?;
                self.air.mark(on_true);
                self.block(then_body)?;
                self.push(AirStmt::Branch(Flag::Always, end));
                self.air.mark(on_false);
                self.block(else_body)?;
                self.air.mark(end);
            }
            Stmt::While { cond, body } => {
                let head = self.air.new_label();
                let start = self.air.new_label();
                let end = self.air.new_label();
                self.air.mark(head);
                self.cond(cond, start, end)?;
                self.air.mark(start);
                self.block(body)?;
                self.push(AirStmt::Branch(Flag::Always, head));
                self.air.mark(end);
            }
        }
        Ok(())
    }

    fn call(&mut self, callee: &str, args: &[Arg]) -> Result<()> {
        let builtin = Builtin::from_name(callee).ok_or_else(|| Error::UnknownBuiltin {
            name: callee.to_owned(),
        })?;
        if args.len() != builtin.arity() {
            return Err(bad_call(
                builtin,
                format!(
                    "expected {} argument(s), found {}",
                    builtin.arity(),
                    args.len()
                ),
            ));
        }
        match builtin {
            Builtin::Hlt => self.push(AirStmt::Hlt),
            Builtin::Inp => self.push(AirStmt::Inp),
            Builtin::Out => self.push(AirStmt::Out),
            Builtin::Sta => {
                let dest = self.place_arg(builtin, &args[0])?;
                self.push(AirStmt::Sta(dest));
            }
            Builtin::Input => {
                let dest = self.place_arg(builtin, &args[0])?;
                self.push(AirStmt::Inp);
                self.push(AirStmt::Sta(dest));
            }
            Builtin::Output => {
                let Arg::Expr(value) = &args[0] else {
                    return Err(bad_call(builtin, "expected a number".to_owned()));
                };
                if value.is_leaf() {
                    let src = self.operand(value)?;
                    self.push(AirStmt::Lda(src));
                } else {
                    // Stage the computed value in TEMP
                    self.expr(value)?;
                    let temp = self.mailboxes.temp();
                    self.push(AirStmt::Sta(temp));
                    self.push(AirStmt::Lda(temp));
                }
                self.push(AirStmt::Out);
            }
            // Directives were folded before emission; only the shape is checked here
            Builtin::Option => OptionResolver::default().directive(args)?,
        }
        Ok(())
    }

    /// Mailbox for the place named by a `&place` argument.
    fn place_arg(&mut self, builtin: Builtin, arg: &Arg) -> Result<Mailbox> {
        match arg {
            Arg::Expr(Expr::Load(place)) => self.dest(place),
            _ => Err(bad_call(builtin, "expected a variable".to_owned())),
        }
    }

    /// Mailbox written by a store to `place`.
    fn dest(&mut self, place: &Place) -> Result<Mailbox> {
        match place {
            Place::Var(name) => self.mailboxes.allocate(name),
            Place::Temp => Ok(self.mailboxes.temp()),
        }
    }

    /// Mailbox already holding a leaf value.
    fn operand(&mut self, expr: &Expr) -> Result<Mailbox> {
        match expr {
            Expr::Const(val) => self.mailboxes.constant(*val as i64),
            Expr::Load(Place::Var(name)) => self.mailboxes.lookup(name),
            Expr::Load(Place::Temp) => Ok(self.mailboxes.temp()),
            Expr::Binary { .. } | Expr::Cmp(_) => {
                self.expr(expr)?;
                let tmp = self.mailboxes.temporary()?;
                self.push(AirStmt::Sta(tmp));
                Ok(tmp)
            }
        }
    }

    /// Evaluate into the accumulator.
    fn expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Cmp(cond) => self.compare(cond),
            leaf => {
                let src = self.operand(leaf)?;
                self.push(AirStmt::Lda(src));
                Ok(())
            }
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<()> {
        match op {
            BinOp::Add => self.additive(lhs, rhs, AirStmt::Add),
            BinOp::Sub => self.additive(lhs, rhs, AirStmt::Sub),
            BinOp::Mul => self.multiply(lhs, rhs),
            BinOp::Div | BinOp::Rem => self.divide(op, lhs, rhs),
        }
    }

    /// `lhs` into the accumulator, then one `ADD`/`SUB` of the rhs mailbox.
    fn additive(&mut self, lhs: &Expr, rhs: &Expr, apply: fn(Mailbox) -> AirStmt) -> Result<()> {
        self.expr(lhs)?;
        let rhs = if rhs.is_leaf() {
            self.operand(rhs)?
        } else {
            let saved = self.mailboxes.temporary()?;
            self.push(AirStmt::Sta(saved));
            let rhs = self.operand(rhs)?;
            self.push(AirStmt::Lda(saved));
            rhs
        };
        self.push(apply(rhs));
        Ok(())
    }

    /// Copy both operands into fresh temporaries the loops are free to overwrite.
    ///
    /// The accumulator is left holding the rhs.
    fn spill(&mut self, lhs: &Expr, rhs: &Expr) -> Result<(Mailbox, Mailbox)> {
        self.expr(lhs)?;
        let lhs = self.mailboxes.temporary()?;
        self.push(AirStmt::Sta(lhs));
        self.expr(rhs)?;
        let rhs = self.mailboxes.temporary()?;
        self.push(AirStmt::Sta(rhs));
        Ok((lhs, rhs))
    }

    /// `m = 0 - m`
    fn negate(&mut self, mailbox: Mailbox) -> Result<()> {
        let zero = self.mailboxes.constant(0)?;
        self.push(AirStmt::Lda(zero));
        self.push(AirStmt::Sub(mailbox));
        self.push(AirStmt::Sta(mailbox));
        Ok(())
    }

    /// Repeated addition, counting the multiplier down to zero.
    fn multiply(&mut self, lhs: &Expr, rhs: &Expr) -> Result<()> {
        let (x, n) = self.spill(lhs, rhs)?;
        let product = self.mailboxes.temporary()?;
        let zero = self.mailboxes.constant(0)?;
        let one = self.mailboxes.constant(1)?;
        let counted = self.air.new_label();
        let head = self.air.new_label();
        let done = self.air.new_label();

        // Flip both signs so the counter is never negative
        self.push(AirStmt::Branch(Flag::Positive, counted));
        self.negate(x)?;
        self.negate(n)?;
        self.air.mark(counted);
        self.push(AirStmt::Lda(zero));
        self.push(AirStmt::Sta(product));

        self.air.mark(head);
        self.push(AirStmt::Lda(n));
        self.push(AirStmt::Branch(Flag::Zero, done));
        self.push(AirStmt::Sub(one));
        self.push(AirStmt::Sta(n));
        self.push(AirStmt::Lda(product));
        self.push(AirStmt::Add(x));
        self.push(AirStmt::Sta(product));
        self.push(AirStmt::Branch(Flag::Always, head));

        self.air.mark(done);
        self.push(AirStmt::Lda(product));
        Ok(())
    }

    /// Repeated subtraction on magnitudes, with the sign restored at the end.
    fn divide(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<()> {
        let (x, n) = self.spill(lhs, rhs)?;
        let quotient = match op {
            BinOp::Div => Some(self.mailboxes.temporary()?),
            _ => None,
        };
        let negative = self.mailboxes.temporary()?;
        let zero = self.mailboxes.constant(0)?;
        let one = self.mailboxes.constant(1)?;
        let x_counted = self.air.new_label();
        let n_counted = self.air.new_label();
        let head = self.air.new_label();
        let step = self.air.new_label();
        let done = self.air.new_label();
        let positive = self.air.new_label();
        let end = self.air.new_label();

        self.push(AirStmt::Lda(zero));
        if let Some(quotient) = quotient {
            self.push(AirStmt::Sta(quotient));
        }
        self.push(AirStmt::Sta(negative));

        self.push(AirStmt::Lda(x));
        self.push(AirStmt::Branch(Flag::Positive, x_counted));
        self.negate(x)?;
        self.push(AirStmt::Lda(one));
        self.push(AirStmt::Sta(negative));
        self.air.mark(x_counted);

        self.push(AirStmt::Lda(n));
        self.push(AirStmt::Branch(Flag::Zero, done));
        self.push(AirStmt::Branch(Flag::Positive, n_counted));
        self.negate(n)?;
        if quotient.is_some() {
            // Quotient sign is the xor of both operand signs
            self.push(AirStmt::Lda(one));
            self.push(AirStmt::Sub(negative));
            self.push(AirStmt::Sta(negative));
        }
        self.air.mark(n_counted);

        self.air.mark(head);
        self.push(AirStmt::Lda(x));
        self.push(AirStmt::Sub(n));
        self.push(AirStmt::Branch(Flag::Positive, step));
        self.push(AirStmt::Branch(Flag::Always, done));
        self.air.mark(step);
        self.push(AirStmt::Sta(x));
        if let Some(quotient) = quotient {
            self.push(AirStmt::Lda(quotient));
            self.push(AirStmt::Add(one));
            self.push(AirStmt::Sta(quotient));
        }
        self.push(AirStmt::Branch(Flag::Always, head));

        let result = quotient.unwrap_or(x);
        self.air.mark(done);
        self.push(AirStmt::Lda(negative));
        self.push(AirStmt::Branch(Flag::Zero, positive));
        self.push(AirStmt::Lda(zero));
        self.push(AirStmt::Sub(result));
        self.push(AirStmt::Branch(Flag::Always, end));
        self.air.mark(positive);
        self.push(AirStmt::Lda(result));
        self.air.mark(end);
        Ok(())
    }

    /// Materialize a comparison as 1 or 0 in the accumulator.
    fn compare(&mut self, cond: &Cond) -> Result<()> {
        let on_true = self.air.new_label();
        let on_false = self.air.new_label();
        let end = self.air.new_label();
        self.cond(cond, on_true, on_false)?;
        self.air.mark(on_true);
        let one = self.mailboxes.constant(1)?;
        self.push(AirStmt::Lda(one));
        self.push(AirStmt::Branch(Flag::Always, end));
        self.air.mark(on_false);
        let zero = self.mailboxes.constant(0)?;
        self.push(AirStmt::Lda(zero));
        self.air.mark(end);
        Ok(())
    }

    /// Branch to `on_true` or `on_false`. Never falls through.
    fn cond(&mut self, cond: &Cond, on_true: Label, on_false: Label) -> Result<()> {
        let Cond { op, lhs, rhs } = cond;
        let (a, b, flag, taken, other) = match op {
            CmpOp::Ge => (lhs, rhs, Flag::Positive, on_true, on_false),
            CmpOp::Lt => (lhs, rhs, Flag::Positive, on_false, on_true),
            CmpOp::Le => (rhs, lhs, Flag::Positive, on_true, on_false),
            CmpOp::Gt => (rhs, lhs, Flag::Positive, on_false, on_true),
            CmpOp::Eq => (lhs, rhs, Flag::Zero, on_true, on_false),
            CmpOp::Ne => (lhs, rhs, Flag::Zero, on_false, on_true),
        };
        self.additive(a, b, AirStmt::Sub)?;
        self.push(AirStmt::Branch(flag, taken));
        self.push(AirStmt::Branch(Flag::Always, other));
        Ok(())
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

fn bad_call(builtin: Builtin, reason: String) -> Error {
    Error::BadCall {
        callee: builtin.name(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mailbox::Slot, symbol::Mailbox};

    fn m(id: usize) -> Mailbox {
        Mailbox::new(id)
    }

    fn lower(body: Vec<Stmt>) -> Result<(Air, MailboxAllocator)> {
        Emitter::new().lower(&Unit::new(body))
    }

    #[test]
    fn add_and_output() {
        let (air, alloc) = lower(vec![
            Stmt::input("a"),
            Stmt::input("b"),
            Stmt::assign("c", Expr::add(Expr::var("a"), Expr::var("b"))),
            Stmt::output(Expr::var("c")),
        ])
        .unwrap();
        assert_eq!(
            air.stmts(),
            &[
                AirStmt::Inp,
                AirStmt::Sta(m(1)),
                AirStmt::Inp,
                AirStmt::Sta(m(2)),
                AirStmt::Lda(m(1)),
                AirStmt::Add(m(2)),
                AirStmt::Sta(m(3)),
                AirStmt::Lda(m(3)),
                AirStmt::Out,
                AirStmt::Hlt,
            ]
        );
        // TEMP was never needed
        assert!(alloc.slot(Mailbox::TEMP).is_none());
    }

    #[test]
    fn computed_output_uses_temp() {
        let (air, alloc) = lower(vec![
            Stmt::input("a"),
            Stmt::output(Expr::sub(Expr::var("a"), Expr::Const(1))),
        ])
        .unwrap();
        assert_eq!(
            air.stmts(),
            &[
                AirStmt::Inp,
                AirStmt::Sta(m(1)),
                AirStmt::Lda(m(1)),
                AirStmt::Sub(m(2)),
                AirStmt::Sta(Mailbox::TEMP),
                AirStmt::Lda(Mailbox::TEMP),
                AirStmt::Out,
                AirStmt::Hlt,
            ]
        );
        assert_eq!(alloc.slot(m(2)), Some(&Slot::Const(1)));
    }

    #[test]
    fn computed_rhs_keeps_order() {
        // a - (b + c)
        let (air, _) = lower(vec![
            Stmt::input("a"),
            Stmt::input("b"),
            Stmt::input("c"),
            Stmt::assign(
                "d",
                Expr::sub(Expr::var("a"), Expr::add(Expr::var("b"), Expr::var("c"))),
            ),
        ])
        .unwrap();
        assert_eq!(
            &air.stmts()[6..],
            &[
                AirStmt::Lda(m(1)),
                AirStmt::Sta(m(4)),
                AirStmt::Lda(m(2)),
                AirStmt::Add(m(3)),
                AirStmt::Sta(m(5)),
                AirStmt::Lda(m(4)),
                AirStmt::Sub(m(5)),
                AirStmt::Sta(m(6)),
                AirStmt::Hlt,
            ]
        );
    }

    #[test]
    fn while_loop_shape() {
        let (air, _) = lower(vec![
            Stmt::input("n"),
            Stmt::While {
                cond: Cond::new(CmpOp::Gt, Expr::var("n"), Expr::Const(0)),
                body: vec![Stmt::assign("n", Expr::sub(Expr::var("n"), Expr::Const(1)))],
            },
        ])
        .unwrap();
        let (head, start, end) = (Label::new(0), Label::new(1), Label::new(2));
        assert_eq!(
            air.stmts(),
            &[
                AirStmt::Inp,
                AirStmt::Sta(m(1)),
                AirStmt::Mark(head),
                // n > 0 is 0 - n < 0
                AirStmt::Lda(m(2)),
                AirStmt::Sub(m(1)),
                AirStmt::Branch(Flag::Positive, end),
                AirStmt::Branch(Flag::Always, start),
                AirStmt::Mark(start),
                AirStmt::Lda(m(1)),
                AirStmt::Sub(m(3)),
                AirStmt::Sta(m(1)),
                AirStmt::Branch(Flag::Always, head),
                AirStmt::Mark(end),
                AirStmt::Hlt,
            ]
        );
    }

    #[test]
    fn if_else_shape() {
        let (air, _) = lower(vec![
            Stmt::input("x"),
            Stmt::If {
                cond: Cond::new(CmpOp::Eq, Expr::var("x"), Expr::Const(5)),
                then_body: vec![Stmt::output(Expr::Const(1))],
                else_body: vec![Stmt::output(Expr::Const(0))],
            },
        ])
        .unwrap();
        let (t, f, e) = (Label::new(0), Label::new(1), Label::new(2));
        assert_eq!(
            &air.stmts()[2..],
            &[
                AirStmt::Lda(m(1)),
                AirStmt::Sub(m(2)),
                AirStmt::Branch(Flag::Zero, t),
                AirStmt::Branch(Flag::Always, f),
                AirStmt::Mark(t),
                AirStmt::Lda(m(3)),
                AirStmt::Out,
                AirStmt::Branch(Flag::Always, e),
                AirStmt::Mark(f),
                AirStmt::Lda(m(4)),
                AirStmt::Out,
                AirStmt::Mark(e),
                AirStmt::Hlt,
            ]
        );
    }

    #[test]
    fn multiply_loop_shape() {
        let (air, _) = lower(vec![
            Stmt::input("a"),
            Stmt::input("b"),
            Stmt::assign("c", Expr::mul(Expr::var("a"), Expr::var("b"))),
        ])
        .unwrap();
        let (x, n, product, zero, one) = (m(3), m(4), m(5), m(6), m(7));
        let (counted, head, done) = (Label::new(0), Label::new(1), Label::new(2));
        assert_eq!(
            &air.stmts()[4..],
            &[
                AirStmt::Lda(m(1)),
                AirStmt::Sta(x),
                AirStmt::Lda(m(2)),
                AirStmt::Sta(n),
                AirStmt::Branch(Flag::Positive, counted),
                AirStmt::Lda(zero),
                AirStmt::Sub(x),
                AirStmt::Sta(x),
                AirStmt::Lda(zero),
                AirStmt::Sub(n),
                AirStmt::Sta(n),
                AirStmt::Mark(counted),
                AirStmt::Lda(zero),
                AirStmt::Sta(product),
                AirStmt::Mark(head),
                AirStmt::Lda(n),
                AirStmt::Branch(Flag::Zero, done),
                AirStmt::Sub(one),
                AirStmt::Sta(n),
                AirStmt::Lda(product),
                AirStmt::Add(x),
                AirStmt::Sta(product),
                AirStmt::Branch(Flag::Always, head),
                AirStmt::Mark(done),
                AirStmt::Lda(product),
                AirStmt::Sta(m(8)),
                AirStmt::Hlt,
            ]
        );
    }

    #[test]
    fn division_loop_state() {
        let temporaries = |alloc: &MailboxAllocator| {
            alloc
                .slots()
                .filter(|(_, slot)| **slot == Slot::Temporary)
                .count()
        };
        let body = |value| vec![Stmt::input("a"), Stmt::assign("q", value)];

        // Operand copies, sign and quotient
        let (div, alloc) = lower(body(Expr::div(Expr::var("a"), Expr::Const(3)))).unwrap();
        assert_eq!(temporaries(&alloc), 4);
        assert_eq!(div.label_count(), 7);
        // The remainder is what is left of the dividend
        let (rem, alloc) = lower(body(Expr::rem(Expr::var("a"), Expr::Const(3)))).unwrap();
        assert_eq!(temporaries(&alloc), 3);
        assert!(rem.code_len() < div.code_len());
        assert!(rem.stmts().ends_with(&[
            AirStmt::Mark(Label::new(6)),
            AirStmt::Sta(alloc.lookup("q").unwrap()),
            AirStmt::Hlt,
        ]));
    }

    #[test]
    fn comparison_value() {
        let (air, alloc) = lower(vec![
            Stmt::input("a"),
            Stmt::assign("x", Expr::cmp(CmpOp::Lt, Expr::var("a"), Expr::Const(3))),
        ])
        .unwrap();
        let (t, f, e) = (Label::new(0), Label::new(1), Label::new(2));
        assert_eq!(
            &air.stmts()[2..],
            &[
                AirStmt::Lda(m(1)),
                AirStmt::Sub(m(2)),
                AirStmt::Branch(Flag::Positive, f),
                AirStmt::Branch(Flag::Always, t),
                AirStmt::Mark(t),
                AirStmt::Lda(m(3)),
                AirStmt::Branch(Flag::Always, e),
                AirStmt::Mark(f),
                AirStmt::Lda(m(4)),
                AirStmt::Mark(e),
                AirStmt::Sta(m(5)),
                AirStmt::Hlt,
            ]
        );
        assert_eq!(alloc.slot(m(3)), Some(&Slot::Const(1)));
        assert_eq!(alloc.slot(m(4)), Some(&Slot::Const(0)));
    }

    #[test]
    fn undefined_read() {
        assert_eq!(
            lower(vec![Stmt::assign(
                "x",
                Expr::add(Expr::var("x"), Expr::Const(1))
            )])
            .err(),
            Some(Error::UndefinedSymbol { name: "x".into() })
        );
    }

    #[test]
    fn builtin_calls() {
        let (air, _) = lower(vec![
            Stmt::call("_inp", vec![]),
            Stmt::call("_sta", vec![Arg::Expr(Expr::Load(Place::Temp))]),
            Stmt::call("_out", vec![]),
            Stmt::option("clean", 1),
            Stmt::call("_hlt", vec![]),
        ])
        .unwrap();
        assert_eq!(
            air.stmts(),
            &[
                AirStmt::Inp,
                AirStmt::Sta(Mailbox::TEMP),
                AirStmt::Out,
                AirStmt::Hlt,
                AirStmt::Hlt,
            ]
        );
    }

    #[test]
    fn bad_calls() {
        assert_eq!(
            lower(vec![Stmt::call("printf", vec![])]).err(),
            Some(Error::UnknownBuiltin {
                name: "printf".into()
            })
        );
        assert!(matches!(
            lower(vec![Stmt::call("_out", vec![Arg::Expr(Expr::Const(1))])]),
            Err(Error::BadCall { callee: "_out", .. })
        ));
        assert!(matches!(
            lower(vec![Stmt::call("input", vec![Arg::Expr(Expr::Const(1))])]),
            Err(Error::BadCall { callee: "input", .. })
        ));
        assert!(matches!(
            lower(vec![Stmt::call("output", vec![Arg::Str("hi".into())])]),
            Err(Error::BadCall {
                callee: "output",
                ..
            })
        ));
    }
}
