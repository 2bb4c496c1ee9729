//! Lowering of safe ternaries into plain conditionals.
//!
//! Replaces every `SafeTernary(guard, body)` with
//! `guard == null ? null : body`, wherever it occurs. Loose equality makes
//! the guard trip on both null and undefined receivers. Each ternary carries
//! its own already-resolved guard and body, so the order in which distinct
//! nodes lower does not matter; the sweep only runs after chain expansion
//! has completed, since expansion needs safe ternaries to remain
//! distinguishable from plain conditionals.

use crate::expr::{BinaryOp, Expr};
use crate::job::CompilationJob;
use crate::visitor::{TraversalFlags, transform_expr_in_op};

/// Run the lowering over every expression of every instruction of every
/// unit. After this sweep no safe ternary remains.
pub fn lower_safe_ternaries(job: &mut CompilationJob) {
    let (arena, _, units) = job.split_mut();
    for unit in units.iter_mut() {
        for op in unit.ops.iter_mut() {
            transform_expr_in_op(op, arena, TraversalFlags::NONE, &mut |arena, expr, _| {
                let Expr::SafeTernary { guard, body } = *arena.expr(expr) else {
                    return expr;
                };
                let null_cmp = arena.null();
                let test = arena.binary(BinaryOp::Eq, guard, null_cmp);
                let null_result = arena.null();
                arena.conditional(test, null_result, Some(body))
            });
        }
    }
}
