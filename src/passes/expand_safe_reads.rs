//! Expansion of null-safe access chains into explicit null guards.
//!
//! `a?.b.c` and friends must yield null when an intermediate receiver is
//! null or undefined, without evaluating any receiver twice. This sweep
//! rewrites every safe access into a [`Expr::SafeTernary`] guard node,
//! folding consecutive plain accesses onto the body of the guard already
//! established for their receiver and introducing temporaries where
//! re-evaluating a receiver would duplicate its effects. The guard nodes are
//! removed again by the ternary-lowering sweep that follows.

use std::ops::ControlFlow;

use rustc_hash::FxHashSet;

use crate::expr::{Expr, ExprArena, ExprId, TempId};
use crate::job::{CompatibilityMode, CompilationJob, TempIdAllocator};
use crate::visitor::{TraversalFlags, transform_expr, transform_expr_in_op, visit_expr};

/// Run the expansion over every expression of every instruction of every
/// unit. A single forward sweep; each node is visited exactly once.
pub fn expand_safe_reads(job: &mut CompilationJob) {
    let mode = job.compatibility;
    let (arena, temps, units) = job.split_mut();
    for unit in units.iter_mut() {
        for op in unit.ops.iter_mut() {
            transform_expr_in_op(op, arena, TraversalFlags::NONE, &mut |arena, expr, _| {
                expand_access(arena, temps, mode, expr)
            });
        }
    }
}

/// Whether evaluating `expr` twice would duplicate observable effects or
/// expensive computation, in which case a guard built from it must be cached
/// in a temporary before reuse.
fn needs_temporary(arena: &ExprArena, expr: ExprId) -> bool {
    match arena.expr(expr) {
        Expr::Unary { expr: inner, .. }
        | Expr::Not { expr: inner }
        | Expr::AssignTemporary { expr: inner, .. } => needs_temporary(arena, *inner),
        Expr::Binary { lhs, rhs, .. } => {
            needs_temporary(arena, *lhs) || needs_temporary(arena, *rhs)
        }
        Expr::Conditional {
            test,
            true_case,
            false_case,
        } => {
            needs_temporary(arena, *test)
                || needs_temporary(arena, *true_case)
                || false_case.is_some_and(|e| needs_temporary(arena, e))
        }
        Expr::ReadProp { receiver, .. } => needs_temporary(arena, *receiver),
        Expr::ReadKey { receiver, index } => {
            needs_temporary(arena, *receiver) || needs_temporary(arena, *index)
        }
        Expr::Invoke { .. }
        | Expr::ArrayLiteral { .. }
        | Expr::MapLiteral { .. }
        | Expr::SafeInvoke { .. }
        | Expr::PipeBinding { .. } => true,
        Expr::Literal(_)
        | Expr::ReadVar(_)
        | Expr::ReadTemporary { .. }
        | Expr::SafeReadProp { .. }
        | Expr::SafeReadKey { .. }
        | Expr::SafeTernary { .. } => false,
    }
}

/// Receiver of an access expression, or `None` for any other node kind.
fn access_receiver(arena: &ExprArena, expr: ExprId) -> Option<ExprId> {
    match arena.expr(expr) {
        Expr::ReadProp { receiver, .. }
        | Expr::ReadKey { receiver, .. }
        | Expr::Invoke { receiver, .. }
        | Expr::SafeReadProp { receiver, .. }
        | Expr::SafeReadKey { receiver, .. }
        | Expr::SafeInvoke { receiver, .. } => Some(*receiver),
        _ => None,
    }
}

/// Find the open guard slot for an access expression: the deepest safe
/// ternary in its receiver's body chain, onto which further accesses must be
/// folded. `None` when the receiver carries no guard chain yet.
fn deepest_safe_ternary(arena: &ExprArena, expr: ExprId) -> Option<ExprId> {
    let receiver = access_receiver(arena, expr)?;
    if !matches!(arena.expr(receiver), Expr::SafeTernary { .. }) {
        return None;
    }
    let mut ternary = receiver;
    loop {
        let Expr::SafeTernary { body, .. } = arena.expr(ternary) else {
            panic!(
                "guard chain contains a {} node where a safe ternary was expected",
                arena.expr(ternary).kind_name()
            );
        };
        if matches!(arena.expr(*body), Expr::SafeTernary { .. }) {
            ternary = *body;
        } else {
            return Some(ternary);
        }
    }
}

/// Body slot of a safe ternary.
fn safe_ternary_body(arena: &ExprArena, ternary: ExprId) -> ExprId {
    match arena.expr(ternary) {
        Expr::SafeTernary { body, .. } => *body,
        other => panic!("expected a safe ternary, found a {} node", other.kind_name()),
    }
}

/// Every temporary id defined by an assignment somewhere inside `expr`.
fn temporaries_in(arena: &ExprArena, expr: ExprId) -> FxHashSet<TempId> {
    let mut defined = FxHashSet::default();
    let _ = visit_expr(arena, expr, &mut |node| {
        if let Expr::AssignTemporary { temp, .. } = node {
            defined.insert(*temp);
        }
        ControlFlow::<()>::Continue(())
    });
    defined
}

/// Temporary deduplication over a structural copy of a reused guard.
///
/// Any assignment in the copy whose id is already defined in the original
/// guard must not define it a second time; it becomes a plain read. Legacy
/// output instead re-assigns the temporary to itself, reproducing the older
/// generator's exact shape.
fn reuse_defined_temporaries(
    arena: &mut ExprArena,
    expr: ExprId,
    defined: &FxHashSet<TempId>,
    mode: CompatibilityMode,
) -> ExprId {
    transform_expr(arena, expr, TraversalFlags::NONE, &mut |arena, id, _| {
        let Expr::AssignTemporary { temp, .. } = *arena.expr(id) else {
            return id;
        };
        if !defined.contains(&temp) {
            return id;
        }
        let read = arena.read_temporary(temp);
        match mode {
            CompatibilityMode::Standard => read,
            CompatibilityMode::Legacy => arena.assign_temporary(temp, read),
        }
    })
}

/// Build a safe ternary guarding `guard`, with a body produced by `build`
/// from the expression that stands in for the guard's value.
///
/// When re-evaluating the guard would duplicate effects, the guard becomes a
/// temporary assignment and the body reads the temporary. Otherwise the body
/// receives a structural copy of the guard, deduplicated against the
/// temporaries the guard already defines: a deeper safe link may have
/// introduced an assignment inside the guard (`a?.[b?.c()]?.d` duplicates
/// the key's assignment into both sides), and the copy must read that
/// temporary rather than define it again.
fn guarded_ternary<F>(
    arena: &mut ExprArena,
    temps: &mut TempIdAllocator,
    mode: CompatibilityMode,
    guard: ExprId,
    build: F,
) -> ExprId
where
    F: FnOnce(&mut ExprArena, ExprId) -> ExprId,
{
    let (guard, value) = if needs_temporary(arena, guard) {
        let temp = temps.allocate();
        let assign = arena.assign_temporary(temp, guard);
        let read = arena.read_temporary(temp);
        (assign, read)
    } else {
        let copy = arena.deep_clone(guard);
        let defined = temporaries_in(arena, guard);
        let copy = reuse_defined_temporaries(arena, copy, &defined, mode);
        (guard, copy)
    };
    let body = build(arena, value);
    arena.safe_ternary(guard, body)
}

/// Per-node rewrite applied by the sweep.
///
/// Non-access expressions pass through untouched. For an access whose
/// receiver already carries a guard chain, a plain access is absorbed into
/// the open guard's body and a safe access nests a fresh guard there; in
/// both cases the access node itself is replaced by its receiver. A safe
/// access with no guard chain yet starts one.
fn expand_access(
    arena: &mut ExprArena,
    temps: &mut TempIdAllocator,
    mode: CompatibilityMode,
    expr: ExprId,
) -> ExprId {
    let Some(receiver) = access_receiver(arena, expr) else {
        return expr;
    };

    match deepest_safe_ternary(arena, expr) {
        Some(dst) => {
            let open_body = safe_ternary_body(arena, dst);
            let new_body = match arena.expr(expr).clone() {
                Expr::ReadProp { name, .. } => arena.prop(open_body, name),
                Expr::ReadKey { index, .. } => arena.key(open_body, index),
                Expr::Invoke { args, .. } => arena.invoke(open_body, args),
                Expr::SafeReadProp { name, .. } => {
                    guarded_ternary(arena, temps, mode, open_body, move |arena, value| {
                        arena.prop(value, name)
                    })
                }
                Expr::SafeReadKey { index, .. } => {
                    guarded_ternary(arena, temps, mode, open_body, move |arena, value| {
                        arena.key(value, index)
                    })
                }
                Expr::SafeInvoke { args, .. } => {
                    guarded_ternary(arena, temps, mode, open_body, move |arena, value| {
                        arena.invoke(value, args)
                    })
                }
                other => panic!(
                    "access expression changed kind mid-rewrite: {}",
                    other.kind_name()
                ),
            };
            arena.set_safe_ternary_body(dst, new_body);
            receiver
        }
        None => match arena.expr(expr).clone() {
            Expr::SafeReadProp { receiver, name } => {
                guarded_ternary(arena, temps, mode, receiver, move |arena, value| {
                    arena.prop(value, name)
                })
            }
            Expr::SafeReadKey { receiver, index } => {
                guarded_ternary(arena, temps, mode, receiver, move |arena, value| {
                    arena.key(value, index)
                })
            }
            Expr::SafeInvoke { receiver, args } => {
                guarded_ternary(arena, temps, mode, receiver, move |arena, value| {
                    arena.invoke(value, args)
                })
            }
            // Plain access with no guard chain: nothing to fold onto.
            _ => expr,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;

    fn arena() -> ExprArena {
        ExprArena::new()
    }

    #[test]
    fn classifier_accepts_cheap_shapes() {
        let mut a = arena();
        let v = a.read_var("a");
        assert!(!needs_temporary(&a, v));

        let v = a.read_var("a");
        let p = a.prop(v, "b");
        assert!(!needs_temporary(&a, p));

        let t = a.read_temporary(TempId(0));
        assert!(!needs_temporary(&a, t));

        let n = a.null();
        assert!(!needs_temporary(&a, n));

        let x = a.read_var("x");
        let y = a.read_var("y");
        let sum = a.binary(BinaryOp::Add, x, y);
        assert!(!needs_temporary(&a, sum));
    }

    #[test]
    fn classifier_flags_effectful_shapes() {
        let mut a = arena();
        let f = a.read_var("f");
        let call = a.invoke(f, vec![]);
        assert!(needs_temporary(&a, call));

        let arr = a.array(vec![]);
        assert!(needs_temporary(&a, arr));

        let m = a.map(vec![]);
        assert!(needs_temporary(&a, m));

        let g = a.read_var("g");
        let safe_call = a.safe_invoke(g, vec![]);
        assert!(needs_temporary(&a, safe_call));

        let p = a.pipe("uppercase", vec![]);
        assert!(needs_temporary(&a, p));
    }

    #[test]
    fn classifier_looks_through_wrappers() {
        let mut a = arena();

        // Binary operand containing a call.
        let f = a.read_var("f");
        let call = a.invoke(f, vec![]);
        let one = a.number(1.0);
        let sum = a.binary(BinaryOp::Add, one, call);
        assert!(needs_temporary(&a, sum));

        // Conditional false case containing an array literal.
        let t = a.read_var("t");
        let x = a.read_var("x");
        let arr = a.array(vec![]);
        let cond = a.conditional(t, x, Some(arr));
        assert!(needs_temporary(&a, cond));

        // Keyed-read index containing a call.
        let r = a.read_var("r");
        let f = a.read_var("f");
        let call = a.invoke(f, vec![]);
        let keyed = a.key(r, call);
        assert!(needs_temporary(&a, keyed));

        // Assignment's inner expression.
        let f = a.read_var("f");
        let call = a.invoke(f, vec![]);
        let assign = a.assign_temporary(TempId(7), call);
        assert!(needs_temporary(&a, assign));
    }

    #[test]
    fn classifier_does_not_look_into_safe_read_receivers() {
        // A safe read's receiver is guarded separately; the read itself is
        // cheap even when the receiver is not.
        let mut a = arena();
        let f = a.read_var("f");
        let call = a.invoke(f, vec![]);
        let safe = a.safe_prop(call, "x");
        assert!(!needs_temporary(&a, safe));
    }

    #[test]
    fn deepest_ternary_walks_the_body_chain() {
        let mut a = arena();
        let g1 = a.read_var("a");
        let b1 = a.read_var("inner_body");
        let inner = a.safe_ternary(g1, b1);
        let g0 = a.read_var("outer_guard");
        let outer = a.safe_ternary(g0, inner);
        let access = a.prop(outer, "c");

        assert_eq!(deepest_safe_ternary(&a, access), Some(inner));
    }

    #[test]
    fn deepest_ternary_absent_for_plain_receivers() {
        let mut a = arena();
        let v = a.read_var("a");
        let access = a.prop(v, "b");
        assert_eq!(deepest_safe_ternary(&a, access), None);

        // Non-access expressions have no open guard slot either.
        let n = a.null();
        assert_eq!(deepest_safe_ternary(&a, n), None);
    }

    #[test]
    fn dedup_converts_defined_assignments_to_reads() {
        let mut a = arena();
        let f = a.read_var("f");
        let call = a.invoke(f, vec![]);
        let guard = a.assign_temporary(TempId(0), call);

        let copy = a.deep_clone(guard);
        let defined = temporaries_in(&a, guard);
        let deduped = reuse_defined_temporaries(&mut a, copy, &defined, CompatibilityMode::Standard);
        assert_eq!(a.print(deduped), "tmp_0");
        // The original guard keeps its defining assignment.
        assert_eq!(a.print(guard), "(tmp_0 = f())");
    }

    #[test]
    fn dedup_in_legacy_mode_self_assigns() {
        let mut a = arena();
        let f = a.read_var("f");
        let call = a.invoke(f, vec![]);
        let guard = a.assign_temporary(TempId(4), call);

        let copy = a.deep_clone(guard);
        let defined = temporaries_in(&a, guard);
        let deduped = reuse_defined_temporaries(&mut a, copy, &defined, CompatibilityMode::Legacy);
        assert_eq!(a.print(deduped), "(tmp_4 = tmp_4)");
    }

    #[test]
    fn dedup_leaves_unrelated_assignments_alone() {
        let mut a = arena();
        let f = a.read_var("f");
        let call = a.invoke(f, vec![]);
        let assign = a.assign_temporary(TempId(9), call);

        let defined = FxHashSet::default();
        let kept = reuse_defined_temporaries(&mut a, assign, &defined, CompatibilityMode::Standard);
        assert_eq!(a.print(kept), "(tmp_9 = f())");
    }
}
