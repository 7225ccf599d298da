//! Control flow: conditions, boolean chains, loops, switch, jumps.
//!
//! Conditions lower straight into branches: `lower_condition` receives
//! the blocks the caller already made for the true and false outcomes, so
//! an `&&`/`||` chain under an `if` becomes a cascade of tests that jump
//! directly into the `if`'s arms. A chain used as a value builds its own
//! two targets and merges them with a phi.
//!
//! Loops and switches push their `LoopTargets` before lowering the body and
//! pop exactly once afterwards, whatever the body did (jumps, returns,
//! errors), so the stack depth on exit equals the depth on entry.

use kes_diagnostic::Diagnostic;
use kes_emit::{BlockId, IntPredicate, TypeKind};
use kes_ir::{BinaryOp, LogicalOp, NodeId, NodeKind, NodeRange, Span, SwitchCase};

use super::{LoopTargets, Lowerer, Operand};

impl Lowerer<'_> {
    // -----------------------------------------------------------------------
    // Conditions
    // -----------------------------------------------------------------------

    /// Lower `cond` as a branch to `then_bb` or `else_bb`.
    ///
    /// Later terms of a chain are only evaluated when earlier terms leave
    /// the outcome open. On error the false target is taken, so the CFG
    /// stays well formed.
    pub fn lower_condition(&mut self, cond: NodeId, then_bb: BlockId, else_bb: BlockId) {
        let ast = self.ast;
        match ast.try_get(cond).map(|n| &n.kind) {
            Some(NodeKind::Logical { op, terms }) => self.lower_logical_condition(*op, *terms, then_bb, else_bb),
            Some(NodeKind::Comparison { first, rest }) => {
                self.lower_comparison_condition(*first, rest, then_bb, else_bb);
            }
            _ => {
                let span = self.span(cond);
                let truth = self
                    .lower_value(cond)
                    .and_then(|v| self.to_bool(v, span));
                match truth {
                    Some(t) => self.emitter.cond_br(t, then_bb, else_bb),
                    None => self.br_if_open(else_bb),
                }
            }
        }
    }

    fn lower_logical_condition(&mut self, op: LogicalOp, terms: NodeRange, then_bb: BlockId, else_bb: BlockId) {
        let ast = self.ast;
        let terms = ast.list(terms);
        let Some((&last, init)) = terms.split_last() else {
            self.br_if_open(else_bb);
            return;
        };
        for &term in init {
            let next = self.append_block(match op {
                LogicalOp::And => "and.next",
                LogicalOp::Or => "or.next",
            });
            match op {
                LogicalOp::And => self.lower_condition(term, next, else_bb),
                LogicalOp::Or => self.lower_condition(term, then_bb, next),
            }
            self.emitter.position_at_end(next);
        }
        self.lower_condition(last, then_bb, else_bb);
    }

    /// `a < b <= c`: each adjacent pair is tested in order; every middle
    /// term is evaluated once.
    fn lower_comparison_condition(
        &mut self,
        first: NodeId,
        rest: &[(BinaryOp, NodeId)],
        then_bb: BlockId,
        else_bb: BlockId,
    ) {
        let Some(mut prev) = self.lower_required(first) else {
            self.br_if_open(else_bb);
            return;
        };
        for (i, &(op, term)) in rest.iter().enumerate() {
            let span = self.span(term);
            let Some(next) = self.lower_required(term) else {
                self.br_if_open(else_bb);
                return;
            };
            let truth = self
                .apply_binary(op, prev, next, span)
                .map(|r| self.load_operand(r))
                .and_then(|v| self.to_bool(v, span));
            let Some(truth) = truth else {
                self.br_if_open(else_bb);
                return;
            };
            if i + 1 == rest.len() {
                self.emitter.cond_br(truth, then_bb, else_bb);
            } else {
                let cont = self.append_block("cmp.next");
                self.emitter.cond_br(truth, cont, else_bb);
                self.emitter.position_at_end(cont);
            }
            prev = next;
        }
    }

    /// A logical or comparison chain used as a value: `bool b = x && y;`.
    pub(crate) fn lower_bool_chain(&mut self, id: NodeId) -> Option<Operand> {
        if self.func.is_none() {
            let span = self.span(id);
            self.error(Diagnostic::structural(
                "global initializers must be constants",
                span,
            ));
            return None;
        }
        let true_bb = self.append_block("bool.true");
        let false_bb = self.append_block("bool.false");
        let join_bb = self.append_block("bool.end");
        self.lower_condition(id, true_bb, false_bb);

        let i1 = self.emitter.int_type(1);
        self.emitter.position_at_end(true_bb);
        let yes = self.emitter.const_int(i1, 1);
        self.emitter.br(join_bb);
        self.emitter.position_at_end(false_bb);
        let no = self.emitter.const_int(i1, 0);
        self.emitter.br(join_bb);
        self.emitter.position_at_end(join_bb);
        Some(Operand::value(
            self.emitter.phi(i1, &[(yes, true_bb), (no, false_bb)]),
        ))
    }

    // -----------------------------------------------------------------------
    // Structured statements
    // -----------------------------------------------------------------------

    pub(crate) fn lower_block(&mut self, stmts: NodeRange) {
        let ast = self.ast;
        for &stmt in ast.list(stmts) {
            if self.is_fatal() {
                return;
            }
            self.lower_stmt(stmt);
        }
    }

    pub(crate) fn lower_if(&mut self, cond: NodeId, then_branch: NodeId, else_branch: NodeId) {
        let then_bb = self.append_block("if.then");
        let else_bb = else_branch.is_valid().then(|| self.append_block("if.else"));
        let end_bb = self.append_block("if.end");

        self.lower_condition(cond, then_bb, else_bb.unwrap_or(end_bb));

        self.emitter.position_at_end(then_bb);
        self.lower_stmt(then_branch);
        self.br_if_open(end_bb);

        if let Some(else_bb) = else_bb {
            self.emitter.position_at_end(else_bb);
            self.lower_stmt(else_branch);
            self.br_if_open(end_bb);
        }
        self.emitter.position_at_end(end_bb);
    }

    pub(crate) fn lower_while(&mut self, cond: NodeId, body: NodeId) {
        let cond_bb = self.append_block("while.cond");
        let body_bb = self.append_block("while.body");
        let end_bb = self.append_block("while.end");

        self.emitter.br(cond_bb);
        self.emitter.position_at_end(cond_bb);
        self.lower_condition(cond, body_bb, end_bb);

        self.emitter.position_at_end(body_bb);
        self.with_targets(
            LoopTargets {
                break_bb: end_bb,
                continue_bb: Some(cond_bb),
            },
            |this| this.lower_stmt(body),
        );
        self.br_if_open(cond_bb);
        self.emitter.position_at_end(end_bb);
    }

    /// `for (init; cond; step) body`. A missing condition loops forever;
    /// `continue` runs the step.
    pub(crate) fn lower_for(&mut self, init: NodeId, cond: NodeId, step: NodeId, body: NodeId) {
        if init.is_valid() {
            self.lower_stmt(init);
        }
        let cond_bb = self.append_block("for.cond");
        let body_bb = self.append_block("for.body");
        let step_bb = self.append_block("for.step");
        let end_bb = self.append_block("for.end");

        self.emitter.br(cond_bb);
        self.emitter.position_at_end(cond_bb);
        if cond.is_valid() {
            self.lower_condition(cond, body_bb, end_bb);
        } else {
            self.emitter.br(body_bb);
        }

        self.emitter.position_at_end(body_bb);
        self.with_targets(
            LoopTargets {
                break_bb: end_bb,
                continue_bb: Some(step_bb),
            },
            |this| this.lower_stmt(body),
        );
        self.br_if_open(step_bb);

        self.emitter.position_at_end(step_bb);
        if step.is_valid() {
            self.lower_stmt(step);
        }
        self.br_if_open(cond_bb);
        self.emitter.position_at_end(end_bb);
    }

    /// `switch`: a chain of equality tests, one body block per case.
    ///
    /// Without `auto_break` a case body that does not jump falls through
    /// into the next case (the last falls into `default`). With it, every
    /// case body ends by jumping to the switch exit.
    pub(crate) fn lower_switch(
        &mut self,
        scrutinee: NodeId,
        cases: &[SwitchCase],
        default: NodeId,
        auto_break: bool,
        span: Span,
    ) {
        let Some(value) = self.lower_value(scrutinee) else {
            return;
        };
        let ty = self.emitter.type_of(value);
        if !self.kind(ty).is_int() {
            self.error(Diagnostic::type_mismatch(
                format!("cannot switch on a value of type '{}'", self.describe(ty)),
                span,
            ));
            return;
        }

        let end_bb = self.append_block("switch.end");
        let default_bb = if default.is_valid() {
            self.append_block("switch.default")
        } else {
            end_bb
        };
        let bodies: Vec<BlockId> = cases.iter().map(|_| self.append_block("switch.case")).collect();

        for (case, &body_bb) in cases.iter().zip(&bodies) {
            let next_test = self.append_block("switch.test");
            let case_span = self.span(case.value);
            let matched = self
                .lower_value(case.value)
                .and_then(|v| self.coerce(v, ty, case_span))
                .map(|v| self.emitter.icmp(IntPredicate::Eq, value, v));
            match matched {
                Some(m) => self.emitter.cond_br(m, body_bb, next_test),
                None => self.emitter.br(next_test),
            }
            self.emitter.position_at_end(next_test);
        }
        self.emitter.br(default_bb);

        let targets = LoopTargets {
            break_bb: end_bb,
            continue_bb: None,
        };
        self.with_targets(targets, |this| {
            for (i, (case, &body_bb)) in cases.iter().zip(&bodies).enumerate() {
                this.emitter.position_at_end(body_bb);
                this.lower_stmt(case.body);
                let fallthrough = if auto_break {
                    end_bb
                } else {
                    bodies.get(i + 1).copied().unwrap_or(default_bb)
                };
                this.br_if_open(fallthrough);
            }
            if default.is_valid() {
                this.emitter.position_at_end(default_bb);
                this.lower_stmt(default);
                this.br_if_open(end_bb);
            }
        });
        self.emitter.position_at_end(end_bb);
    }

    /// Run `f` with `targets` pushed, popping them afterwards.
    fn with_targets(&mut self, targets: LoopTargets, f: impl FnOnce(&mut Self)) {
        let depth = self.loops.len();
        self.loops.push(targets);
        f(self);
        self.loops.truncate(depth);
    }

    // -----------------------------------------------------------------------
    // Jumps
    // -----------------------------------------------------------------------

    pub(crate) fn lower_break(&mut self, span: Span) {
        match self.loops.last() {
            Some(targets) => {
                let dest = targets.break_bb;
                self.emitter.br(dest);
                self.start_dead_block();
            }
            None => self.error(Diagnostic::structural(
                "'break' outside a loop or switch",
                span,
            )),
        }
    }

    /// `continue` skips enclosing switches to reach the nearest loop.
    pub(crate) fn lower_continue(&mut self, span: Span) {
        match self.loops.iter().rev().find_map(|t| t.continue_bb) {
            Some(dest) => {
                self.emitter.br(dest);
                self.start_dead_block();
            }
            None => self.error(Diagnostic::structural("'continue' outside a loop", span)),
        }
    }

    pub(crate) fn lower_return(&mut self, value: NodeId, span: Span) {
        let Some(func) = self.func.clone() else {
            return;
        };
        let returns_void = self.kind(func.ret) == TypeKind::Void;
        match (value.is_valid(), returns_void) {
            (false, true) => self.emitter.ret(None),
            (false, false) => {
                self.error(Diagnostic::type_mismatch(
                    format!("'{}' must return a value", func.symbol),
                    span,
                ));
                return;
            }
            (true, true) => {
                self.error(Diagnostic::type_mismatch(
                    format!("'{}' returns 'void'", func.symbol),
                    span,
                ));
                return;
            }
            (true, false) if func.ret_ref => {
                let Some(op) = self.lower_required(value) else {
                    return;
                };
                if self.operand_ty(op) != func.ret {
                    self.error(Diagnostic::type_mismatch(
                        format!(
                            "expected '{}&', found '{}'",
                            self.describe(func.ret),
                            self.describe(self.operand_ty(op))
                        ),
                        span,
                    ));
                    return;
                }
                let address = self.address_of(op);
                self.emitter.ret(Some(address));
            }
            (true, false) => {
                let Some(v) = self
                    .lower_value(value)
                    .and_then(|v| self.coerce(v, func.ret, span))
                else {
                    return;
                };
                self.emitter.ret(Some(v));
            }
        }
        self.start_dead_block();
    }

    /// Fall-off-the-end return: the zero value, or `ret void`.
    pub(crate) fn emit_default_return(&mut self) {
        let Some(func) = self.func.clone() else {
            return;
        };
        if self.kind(func.ret) == TypeKind::Void {
            self.emitter.ret(None);
        } else if func.ret_ref {
            let ptr = self.emitter.pointer_type(func.ret);
            let null = self.emitter.const_null(ptr);
            self.emitter.ret(Some(null));
        } else {
            let zero = self.emitter.const_zero(func.ret);
            self.emitter.ret(Some(zero));
        }
    }
}

