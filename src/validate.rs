//! Post-pass invariant checks.
//!
//! Catches malformed IR right after the safe-read sweeps, with a clear error
//! instead of letting a later pass miscompile null semantics silently.

use std::ops::ControlFlow;

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::expr::{Expr, ExprArena, TempId};
use crate::job::CompilationJob;
use crate::visitor::visit_expr;

/// An invariant violation found in lowered IR.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantError {
    /// A safe access or safe ternary survived both sweeps.
    #[error("a {0} node survived safe-read lowering")]
    ResidualSafeNode(&'static str),

    /// A temporary id has more than one defining assignment.
    #[error("temporary {0} has more than one defining assignment")]
    DuplicateDefinition(TempId),
}

/// Check a fully lowered job: no safe nodes remain, and every temporary id
/// has at most one defining assignment.
///
/// A legacy-mode self-assignment (`tmp = tmp`) re-assigns an existing
/// temporary and does not count as a definition.
pub fn check_lowered(job: &CompilationJob) -> Result<(), InvariantError> {
    let mut defined: FxHashSet<TempId> = FxHashSet::default();

    for unit in &job.units {
        for op in &unit.ops {
            let mut error = None;
            let _ = visit_expr(&job.arena, op.expression(), &mut |node| {
                if let Some(found) = check_node(&job.arena, node, &mut defined) {
                    error = Some(found);
                    return ControlFlow::Break(());
                }
                ControlFlow::Continue(())
            });
            if let Some(err) = error {
                return Err(err);
            }
        }
    }

    Ok(())
}

fn check_node(
    arena: &ExprArena,
    node: &Expr,
    defined: &mut FxHashSet<TempId>,
) -> Option<InvariantError> {
    match node {
        Expr::SafeReadProp { .. }
        | Expr::SafeReadKey { .. }
        | Expr::SafeInvoke { .. }
        | Expr::SafeTernary { .. } => Some(InvariantError::ResidualSafeNode(node.kind_name())),
        Expr::AssignTemporary { temp, expr } => {
            let self_assign = matches!(
                arena.expr(*expr),
                Expr::ReadTemporary { temp: read } if read == temp
            );
            if self_assign {
                None
            } else if defined.insert(*temp) {
                None
            } else {
                Some(InvariantError::DuplicateDefinition(*temp))
            }
        }
        _ => None,
    }
}
