//! Generic traversal over expression trees.
//!
//! Two walks are provided: [`transform_expr`], a post-order rewrite that
//! visits every node exactly once and lets the transform replace a node by
//! returning a different id, and [`visit_expr`], a read-only pre-order walk
//! that can stop early via [`ControlFlow`]. Post-order matters for the
//! rewrite: a node's children are rewritten before the node itself, so an
//! access expression always sees its receiver in already-rewritten form.

use std::ops::ControlFlow;

use crate::expr::{Expr, ExprArena, ExprId};
use crate::job::Op;

/// Opaque traversal context handed to every transform invocation.
///
/// The expression passes in this crate do not distinguish traversal modes;
/// they pass [`TraversalFlags::NONE`] through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraversalFlags(u32);

impl TraversalFlags {
    pub const NONE: TraversalFlags = TraversalFlags(0);
}

/// Rewrite every expression reachable from `expr`, children before parents.
///
/// The transform receives the arena, the id of the node being visited (its
/// children already rewritten in place) and the traversal flags, and returns
/// the id that should take the node's place in its parent. Returning the
/// same id leaves the node where it is.
pub fn transform_expr<F>(
    arena: &mut ExprArena,
    expr: ExprId,
    flags: TraversalFlags,
    transform: &mut F,
) -> ExprId
where
    F: FnMut(&mut ExprArena, ExprId, TraversalFlags) -> ExprId,
{
    let rewritten = match arena.expr(expr).clone() {
        Expr::Literal(_) | Expr::ReadVar(_) | Expr::ReadTemporary { .. } => None,
        Expr::Unary { op, expr: inner } => Some(Expr::Unary {
            op,
            expr: transform_expr(arena, inner, flags, transform),
        }),
        Expr::Binary { op, lhs, rhs } => Some(Expr::Binary {
            op,
            lhs: transform_expr(arena, lhs, flags, transform),
            rhs: transform_expr(arena, rhs, flags, transform),
        }),
        Expr::Conditional {
            test,
            true_case,
            false_case,
        } => Some(Expr::Conditional {
            test: transform_expr(arena, test, flags, transform),
            true_case: transform_expr(arena, true_case, flags, transform),
            false_case: false_case.map(|e| transform_expr(arena, e, flags, transform)),
        }),
        Expr::Not { expr: inner } => Some(Expr::Not {
            expr: transform_expr(arena, inner, flags, transform),
        }),
        Expr::ArrayLiteral { elements } => Some(Expr::ArrayLiteral {
            elements: elements
                .into_iter()
                .map(|e| transform_expr(arena, e, flags, transform))
                .collect(),
        }),
        Expr::MapLiteral { entries } => Some(Expr::MapLiteral {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k, transform_expr(arena, v, flags, transform)))
                .collect(),
        }),
        Expr::ReadProp { receiver, name } => Some(Expr::ReadProp {
            receiver: transform_expr(arena, receiver, flags, transform),
            name,
        }),
        Expr::ReadKey { receiver, index } => Some(Expr::ReadKey {
            receiver: transform_expr(arena, receiver, flags, transform),
            index: transform_expr(arena, index, flags, transform),
        }),
        Expr::Invoke { receiver, args } => Some(Expr::Invoke {
            receiver: transform_expr(arena, receiver, flags, transform),
            args: args
                .into_iter()
                .map(|a| transform_expr(arena, a, flags, transform))
                .collect(),
        }),
        Expr::SafeReadProp { receiver, name } => Some(Expr::SafeReadProp {
            receiver: transform_expr(arena, receiver, flags, transform),
            name,
        }),
        Expr::SafeReadKey { receiver, index } => Some(Expr::SafeReadKey {
            receiver: transform_expr(arena, receiver, flags, transform),
            index: transform_expr(arena, index, flags, transform),
        }),
        Expr::SafeInvoke { receiver, args } => Some(Expr::SafeInvoke {
            receiver: transform_expr(arena, receiver, flags, transform),
            args: args
                .into_iter()
                .map(|a| transform_expr(arena, a, flags, transform))
                .collect(),
        }),
        Expr::PipeBinding { name, args } => Some(Expr::PipeBinding {
            name,
            args: args
                .into_iter()
                .map(|a| transform_expr(arena, a, flags, transform))
                .collect(),
        }),
        Expr::AssignTemporary { temp, expr: inner } => Some(Expr::AssignTemporary {
            temp,
            expr: transform_expr(arena, inner, flags, transform),
        }),
        Expr::SafeTernary { guard, body } => Some(Expr::SafeTernary {
            guard: transform_expr(arena, guard, flags, transform),
            body: transform_expr(arena, body, flags, transform),
        }),
    };
    if let Some(node) = rewritten {
        *arena.expr_mut(expr) = node;
    }
    transform(arena, expr, flags)
}

/// Rewrite every expression reachable from an instruction.
pub fn transform_expr_in_op<F>(
    op: &mut Op,
    arena: &mut ExprArena,
    flags: TraversalFlags,
    transform: &mut F,
) where
    F: FnMut(&mut ExprArena, ExprId, TraversalFlags) -> ExprId,
{
    match op {
        Op::Statement { expr } | Op::Bind { expr, .. } => {
            *expr = transform_expr(arena, *expr, flags, transform);
        }
    }
}

/// Read-only pre-order walk with early termination.
pub fn visit_expr<F>(arena: &ExprArena, expr: ExprId, visit: &mut F) -> ControlFlow<()>
where
    F: FnMut(&Expr) -> ControlFlow<()>,
{
    visit(arena.expr(expr))?;
    match arena.expr(expr) {
        Expr::Literal(_) | Expr::ReadVar(_) | Expr::ReadTemporary { .. } => {}
        Expr::Unary { expr: inner, .. }
        | Expr::Not { expr: inner }
        | Expr::AssignTemporary { expr: inner, .. } => {
            visit_expr(arena, *inner, visit)?;
        }
        Expr::Binary { lhs, rhs, .. } => {
            visit_expr(arena, *lhs, visit)?;
            visit_expr(arena, *rhs, visit)?;
        }
        Expr::Conditional {
            test,
            true_case,
            false_case,
        } => {
            visit_expr(arena, *test, visit)?;
            visit_expr(arena, *true_case, visit)?;
            if let Some(e) = false_case {
                visit_expr(arena, *e, visit)?;
            }
        }
        Expr::ArrayLiteral { elements } => {
            for e in elements {
                visit_expr(arena, *e, visit)?;
            }
        }
        Expr::MapLiteral { entries } => {
            for (_, v) in entries {
                visit_expr(arena, *v, visit)?;
            }
        }
        Expr::ReadProp { receiver, .. }
        | Expr::SafeReadProp { receiver, .. } => {
            visit_expr(arena, *receiver, visit)?;
        }
        Expr::ReadKey { receiver, index } | Expr::SafeReadKey { receiver, index } => {
            visit_expr(arena, *receiver, visit)?;
            visit_expr(arena, *index, visit)?;
        }
        Expr::Invoke { receiver, args } | Expr::SafeInvoke { receiver, args } => {
            visit_expr(arena, *receiver, visit)?;
            for a in args {
                visit_expr(arena, *a, visit)?;
            }
        }
        Expr::PipeBinding { args, .. } => {
            for a in args {
                visit_expr(arena, *a, visit)?;
            }
        }
        Expr::SafeTernary { guard, body } => {
            visit_expr(arena, *guard, visit)?;
            visit_expr(arena, *body, visit)?;
        }
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::LiteralValue;

    #[test]
    fn transform_visits_children_before_parents() {
        let mut arena = ExprArena::new();
        let a = arena.read_var("a");
        let b = arena.prop(a, "b");
        let c = arena.prop(b, "c");

        let mut seen = Vec::new();
        transform_expr(&mut arena, c, TraversalFlags::NONE, &mut |arena, id, _| {
            seen.push(arena.expr(id).kind_name());
            id
        });
        assert_eq!(seen, vec!["read-var", "read-prop", "read-prop"]);
    }

    #[test]
    fn transform_replaces_nodes_through_parent_slots() {
        let mut arena = ExprArena::new();
        let a = arena.read_var("a");
        let b = arena.prop(a, "b");
        let root = arena.not(b);

        // Replace every variable read with a null literal.
        let mut to_null = |arena: &mut ExprArena, id: ExprId, _flags: TraversalFlags| {
            if matches!(arena.expr(id), Expr::ReadVar(_)) {
                arena.literal(LiteralValue::Null)
            } else {
                id
            }
        };
        let result = transform_expr(&mut arena, root, TraversalFlags::NONE, &mut to_null);
        assert_eq!(arena.print(result), "!null.b");
    }

    #[test]
    fn visit_short_circuits() {
        let mut arena = ExprArena::new();
        let a = arena.read_var("a");
        let b = arena.prop(a, "b");
        let f = arena.read_var("f");
        let root = arena.invoke(f, vec![b]);

        let mut visited = 0;
        let flow = visit_expr(&arena, root, &mut |node| {
            visited += 1;
            if matches!(node, Expr::ReadVar(name) if name == "f") {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(flow, ControlFlow::Break(()));
        // Invoke, then its receiver `f`; the argument subtree is never reached.
        assert_eq!(visited, 2);
    }
}
