//! Expression tree model for the template IR.
//!
//! Expressions live in an [`ExprArena`] and reference each other by
//! [`ExprId`]. Storing children as indices rather than boxes keeps node
//! replacement cheap (a parent slot is just overwritten with a new id) and
//! makes the one mutable slot in the whole model explicit: the `body` of a
//! [`Expr::SafeTernary`] is reassigned in place while a safe-access chain is
//! folded onto it, and [`ExprArena::set_safe_ternary_body`] is the only
//! writer.

use std::fmt;

/// Index of an expression node in an [`ExprArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

/// Identifier of a temporary introduced to cache a receiver expression.
///
/// Minted by the compilation job, monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(pub u32);

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tmp_{}", self.0)
    }
}

/// Literal values the IR can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Null,
    Undefined,
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus, // -
    Plus,  // +
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Loose equality matches both null and undefined, which is what the
    // lowered null guards rely on.
    Eq,          // ==
    NotEq,       // !=
    StrictEq,    // ===
    StrictNotEq, // !==
    Lt,          // <
    Gt,          // >
    Add,         // +
    Sub,         // -
    Mul,         // *
    Div,         // /
    And,         // &&
    Or,          // ||
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// The closed set of expression node kinds the safe-read passes operate on.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(LiteralValue),

    /// Bare reference to a name in the surrounding scope.
    ReadVar(String),

    Unary {
        op: UnaryOp,
        expr: ExprId,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Conditional {
        test: ExprId,
        true_case: ExprId,
        false_case: Option<ExprId>,
    },
    Not {
        expr: ExprId,
    },
    ArrayLiteral {
        elements: Vec<ExprId>,
    },
    MapLiteral {
        entries: Vec<(String, ExprId)>,
    },

    // Access expressions. The safe variants yield null instead of failing
    // when their receiver is null or undefined; the expansion pass rewrites
    // them away.
    ReadProp {
        receiver: ExprId,
        name: String,
    },
    ReadKey {
        receiver: ExprId,
        index: ExprId,
    },
    Invoke {
        receiver: ExprId,
        args: Vec<ExprId>,
    },
    SafeReadProp {
        receiver: ExprId,
        name: String,
    },
    SafeReadKey {
        receiver: ExprId,
        index: ExprId,
    },
    SafeInvoke {
        receiver: ExprId,
        args: Vec<ExprId>,
    },

    /// Call to a value transformation pipe. Always treated as side-effecting.
    PipeBinding {
        name: String,
        args: Vec<ExprId>,
    },

    /// Defining (or, in legacy output, re-assigning) occurrence of a
    /// temporary.
    AssignTemporary {
        temp: TempId,
        expr: ExprId,
    },
    ReadTemporary {
        temp: TempId,
    },

    /// Null guard produced by chain expansion: evaluates to null when `guard`
    /// is null or undefined, otherwise to `body`. The `body` slot is extended
    /// in place as outer accesses are folded onto the guard; it only exists
    /// between the expansion sweep and the lowering sweep.
    SafeTernary {
        guard: ExprId,
        body: ExprId,
    },
}

impl Expr {
    /// Short name of the node kind, for invariant failure messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "literal",
            Expr::ReadVar(_) => "read-var",
            Expr::Unary { .. } => "unary",
            Expr::Binary { .. } => "binary",
            Expr::Conditional { .. } => "conditional",
            Expr::Not { .. } => "not",
            Expr::ArrayLiteral { .. } => "array-literal",
            Expr::MapLiteral { .. } => "map-literal",
            Expr::ReadProp { .. } => "read-prop",
            Expr::ReadKey { .. } => "read-key",
            Expr::Invoke { .. } => "invoke",
            Expr::SafeReadProp { .. } => "safe-read-prop",
            Expr::SafeReadKey { .. } => "safe-read-key",
            Expr::SafeInvoke { .. } => "safe-invoke",
            Expr::PipeBinding { .. } => "pipe-binding",
            Expr::AssignTemporary { .. } => "assign-temporary",
            Expr::ReadTemporary { .. } => "read-temporary",
            Expr::SafeTernary { .. } => "safe-ternary",
        }
    }
}

/// Arena holding every expression node of a compilation job.
///
/// Nodes are never removed; a node replaced in its parent simply becomes
/// unreachable. Ids handed out by one arena must not be used with another.
#[derive(Debug, Default)]
pub struct ExprArena {
    nodes: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        ExprArena { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn alloc(&mut self, node: Expr) -> ExprId {
        let id = u32::try_from(self.nodes.len()).unwrap_or_else(|_| {
            panic!("expression arena overflowed u32 indices");
        });
        self.nodes.push(node);
        ExprId(id)
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        match self.nodes.get(id.0 as usize) {
            Some(node) => node,
            None => panic!("dangling expression id {:?}", id),
        }
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        match self.nodes.get_mut(id.0 as usize) {
            Some(node) => node,
            None => panic!("dangling expression id {:?}", id),
        }
    }

    /// Reassign the body slot of a safe ternary. The only writer of that
    /// slot; panics if `ternary` is any other node kind.
    pub fn set_safe_ternary_body(&mut self, ternary: ExprId, new_body: ExprId) {
        match self.expr_mut(ternary) {
            Expr::SafeTernary { body, .. } => *body = new_body,
            other => panic!(
                "set_safe_ternary_body called on a {} node",
                other.kind_name()
            ),
        }
    }

    /// Structural copy of an expression and all of its descendants.
    pub fn deep_clone(&mut self, expr: ExprId) -> ExprId {
        let node = match self.expr(expr).clone() {
            leaf @ (Expr::Literal(_) | Expr::ReadVar(_) | Expr::ReadTemporary { .. }) => leaf,
            Expr::Unary { op, expr } => Expr::Unary {
                op,
                expr: self.deep_clone(expr),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op,
                lhs: self.deep_clone(lhs),
                rhs: self.deep_clone(rhs),
            },
            Expr::Conditional {
                test,
                true_case,
                false_case,
            } => Expr::Conditional {
                test: self.deep_clone(test),
                true_case: self.deep_clone(true_case),
                false_case: false_case.map(|e| self.deep_clone(e)),
            },
            Expr::Not { expr } => Expr::Not {
                expr: self.deep_clone(expr),
            },
            Expr::ArrayLiteral { elements } => Expr::ArrayLiteral {
                elements: elements.into_iter().map(|e| self.deep_clone(e)).collect(),
            },
            Expr::MapLiteral { entries } => Expr::MapLiteral {
                entries: entries
                    .into_iter()
                    .map(|(k, v)| (k, self.deep_clone(v)))
                    .collect(),
            },
            Expr::ReadProp { receiver, name } => Expr::ReadProp {
                receiver: self.deep_clone(receiver),
                name,
            },
            Expr::ReadKey { receiver, index } => Expr::ReadKey {
                receiver: self.deep_clone(receiver),
                index: self.deep_clone(index),
            },
            Expr::Invoke { receiver, args } => Expr::Invoke {
                receiver: self.deep_clone(receiver),
                args: args.into_iter().map(|a| self.deep_clone(a)).collect(),
            },
            Expr::SafeReadProp { receiver, name } => Expr::SafeReadProp {
                receiver: self.deep_clone(receiver),
                name,
            },
            Expr::SafeReadKey { receiver, index } => Expr::SafeReadKey {
                receiver: self.deep_clone(receiver),
                index: self.deep_clone(index),
            },
            Expr::SafeInvoke { receiver, args } => Expr::SafeInvoke {
                receiver: self.deep_clone(receiver),
                args: args.into_iter().map(|a| self.deep_clone(a)).collect(),
            },
            Expr::PipeBinding { name, args } => Expr::PipeBinding {
                name,
                args: args.into_iter().map(|a| self.deep_clone(a)).collect(),
            },
            Expr::AssignTemporary { temp, expr } => Expr::AssignTemporary {
                temp,
                expr: self.deep_clone(expr),
            },
            Expr::SafeTernary { guard, body } => Expr::SafeTernary {
                guard: self.deep_clone(guard),
                body: self.deep_clone(body),
            },
        };
        self.alloc(node)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Builder helpers
// ═══════════════════════════════════════════════════════════════════════════

impl ExprArena {
    pub fn literal(&mut self, value: LiteralValue) -> ExprId {
        self.alloc(Expr::Literal(value))
    }

    pub fn null(&mut self) -> ExprId {
        self.literal(LiteralValue::Null)
    }

    pub fn number(&mut self, value: f64) -> ExprId {
        self.literal(LiteralValue::Number(value))
    }

    pub fn read_var(&mut self, name: impl Into<String>) -> ExprId {
        self.alloc(Expr::ReadVar(name.into()))
    }

    pub fn unary(&mut self, op: UnaryOp, expr: ExprId) -> ExprId {
        self.alloc(Expr::Unary { op, expr })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.alloc(Expr::Binary { op, lhs, rhs })
    }

    pub fn conditional(
        &mut self,
        test: ExprId,
        true_case: ExprId,
        false_case: Option<ExprId>,
    ) -> ExprId {
        self.alloc(Expr::Conditional {
            test,
            true_case,
            false_case,
        })
    }

    pub fn not(&mut self, expr: ExprId) -> ExprId {
        self.alloc(Expr::Not { expr })
    }

    pub fn array(&mut self, elements: Vec<ExprId>) -> ExprId {
        self.alloc(Expr::ArrayLiteral { elements })
    }

    pub fn map(&mut self, entries: Vec<(String, ExprId)>) -> ExprId {
        self.alloc(Expr::MapLiteral { entries })
    }

    pub fn prop(&mut self, receiver: ExprId, name: impl Into<String>) -> ExprId {
        self.alloc(Expr::ReadProp {
            receiver,
            name: name.into(),
        })
    }

    pub fn safe_prop(&mut self, receiver: ExprId, name: impl Into<String>) -> ExprId {
        self.alloc(Expr::SafeReadProp {
            receiver,
            name: name.into(),
        })
    }

    pub fn key(&mut self, receiver: ExprId, index: ExprId) -> ExprId {
        self.alloc(Expr::ReadKey { receiver, index })
    }

    pub fn safe_key(&mut self, receiver: ExprId, index: ExprId) -> ExprId {
        self.alloc(Expr::SafeReadKey { receiver, index })
    }

    pub fn invoke(&mut self, receiver: ExprId, args: Vec<ExprId>) -> ExprId {
        self.alloc(Expr::Invoke { receiver, args })
    }

    pub fn safe_invoke(&mut self, receiver: ExprId, args: Vec<ExprId>) -> ExprId {
        self.alloc(Expr::SafeInvoke { receiver, args })
    }

    pub fn pipe(&mut self, name: impl Into<String>, args: Vec<ExprId>) -> ExprId {
        self.alloc(Expr::PipeBinding {
            name: name.into(),
            args,
        })
    }

    pub fn assign_temporary(&mut self, temp: TempId, expr: ExprId) -> ExprId {
        self.alloc(Expr::AssignTemporary { temp, expr })
    }

    pub fn read_temporary(&mut self, temp: TempId) -> ExprId {
        self.alloc(Expr::ReadTemporary { temp })
    }

    pub fn safe_ternary(&mut self, guard: ExprId, body: ExprId) -> ExprId {
        self.alloc(Expr::SafeTernary { guard, body })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Source-like printing (debugging and test assertions)
// ═══════════════════════════════════════════════════════════════════════════

impl ExprArena {
    /// Render an expression in source-like notation, e.g.
    /// `a == null ? null : a.b`. Meant for tests and debugging, not codegen.
    pub fn print(&self, expr: ExprId) -> String {
        let mut out = String::new();
        self.write(&mut out, expr);
        out
    }

    fn write(&self, out: &mut String, expr: ExprId) {
        match self.expr(expr) {
            Expr::Literal(value) => match value {
                LiteralValue::Null => out.push_str("null"),
                LiteralValue::Undefined => out.push_str("undefined"),
                LiteralValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
                LiteralValue::Number(n) => out.push_str(&n.to_string()),
                LiteralValue::String(s) => {
                    out.push('"');
                    out.push_str(s);
                    out.push('"');
                }
            },
            Expr::ReadVar(name) => out.push_str(name),
            Expr::Unary { op, expr } => {
                out.push_str(op.as_str());
                self.write_operand(out, *expr);
            }
            Expr::Binary { op, lhs, rhs } => {
                self.write_operand(out, *lhs);
                out.push(' ');
                out.push_str(op.as_str());
                out.push(' ');
                self.write_operand(out, *rhs);
            }
            Expr::Conditional {
                test,
                true_case,
                false_case,
            } => {
                self.write_branch(out, *test);
                out.push_str(" ? ");
                self.write_branch(out, *true_case);
                out.push_str(" : ");
                match false_case {
                    Some(e) => self.write_branch(out, *e),
                    None => out.push_str("undefined"),
                }
            }
            Expr::Not { expr } => {
                out.push('!');
                self.write_operand(out, *expr);
            }
            Expr::ArrayLiteral { elements } => {
                out.push('[');
                self.write_list(out, elements);
                out.push(']');
            }
            Expr::MapLiteral { entries } => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push_str(": ");
                    self.write(out, *value);
                }
                out.push('}');
            }
            Expr::ReadProp { receiver, name } => {
                self.write_receiver(out, *receiver);
                out.push('.');
                out.push_str(name);
            }
            Expr::ReadKey { receiver, index } => {
                self.write_receiver(out, *receiver);
                out.push('[');
                self.write(out, *index);
                out.push(']');
            }
            Expr::Invoke { receiver, args } => {
                self.write_receiver(out, *receiver);
                out.push('(');
                self.write_list(out, args);
                out.push(')');
            }
            Expr::SafeReadProp { receiver, name } => {
                self.write_receiver(out, *receiver);
                out.push_str("?.");
                out.push_str(name);
            }
            Expr::SafeReadKey { receiver, index } => {
                self.write_receiver(out, *receiver);
                out.push_str("?.[");
                self.write(out, *index);
                out.push(']');
            }
            Expr::SafeInvoke { receiver, args } => {
                self.write_receiver(out, *receiver);
                out.push_str("?.(");
                self.write_list(out, args);
                out.push(')');
            }
            Expr::PipeBinding { name, args } => {
                out.push_str(name);
                out.push('(');
                self.write_list(out, args);
                out.push(')');
            }
            Expr::AssignTemporary { temp, expr } => {
                out.push('(');
                out.push_str(&temp.to_string());
                out.push_str(" = ");
                self.write(out, *expr);
                out.push(')');
            }
            Expr::ReadTemporary { temp } => out.push_str(&temp.to_string()),
            Expr::SafeTernary { guard, body } => {
                self.write_operand(out, *guard);
                out.push_str(" ?: ");
                self.write_operand(out, *body);
            }
        }
    }

    fn write_list(&self, out: &mut String, items: &[ExprId]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write(out, *item);
        }
    }

    /// Operand of a binary or unary operator.
    fn write_operand(&self, out: &mut String, expr: ExprId) {
        let parens = matches!(
            self.expr(expr),
            Expr::Binary { .. } | Expr::Conditional { .. } | Expr::SafeTernary { .. }
        );
        self.write_wrapped(out, expr, parens);
    }

    /// Test or branch of a conditional. Binary tests stay bare: `?:` binds
    /// looser than any binary operator.
    fn write_branch(&self, out: &mut String, expr: ExprId) {
        let parens = matches!(
            self.expr(expr),
            Expr::Conditional { .. } | Expr::SafeTernary { .. }
        );
        self.write_wrapped(out, expr, parens);
    }

    /// Receiver of a property/key/invoke access.
    fn write_receiver(&self, out: &mut String, expr: ExprId) {
        let parens = matches!(
            self.expr(expr),
            Expr::Binary { .. }
                | Expr::Conditional { .. }
                | Expr::Unary { .. }
                | Expr::Not { .. }
                | Expr::SafeTernary { .. }
        );
        self.write_wrapped(out, expr, parens);
    }

    fn write_wrapped(&self, out: &mut String, expr: ExprId, parens: bool) {
        if parens {
            out.push('(');
        }
        self.write(out, expr);
        if parens {
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_chained_access() {
        let mut arena = ExprArena::new();
        let a = arena.read_var("a");
        let b = arena.prop(a, "b");
        let i = arena.read_var("i");
        let keyed = arena.key(b, i);
        let x = arena.read_var("x");
        let call = arena.invoke(keyed, vec![x]);
        assert_eq!(arena.print(call), "a.b[i](x)");
    }

    #[test]
    fn print_safe_access_forms() {
        let mut arena = ExprArena::new();
        let a = arena.read_var("a");
        let sp = arena.safe_prop(a, "b");
        assert_eq!(arena.print(sp), "a?.b");

        let a = arena.read_var("a");
        let i = arena.read_var("i");
        let sk = arena.safe_key(a, i);
        assert_eq!(arena.print(sk), "a?.[i]");

        let a = arena.read_var("a");
        let si = arena.safe_invoke(a, vec![]);
        assert_eq!(arena.print(si), "a?.()");
    }

    #[test]
    fn print_temporary_assignment() {
        let mut arena = ExprArena::new();
        let f = arena.read_var("f");
        let call = arena.invoke(f, vec![]);
        let assign = arena.assign_temporary(TempId(3), call);
        assert_eq!(arena.print(assign), "(tmp_3 = f())");
    }

    #[test]
    fn print_conditional_nested_in_false_case() {
        let mut arena = ExprArena::new();
        let a = arena.read_var("a");
        let null1 = arena.null();
        let test = arena.binary(BinaryOp::Eq, a, null1);
        let null2 = arena.null();
        let b = arena.read_var("b");
        let c = arena.read_var("c");
        let null3 = arena.null();
        let inner_test = arena.binary(BinaryOp::Eq, b, null3);
        let null4 = arena.null();
        let inner = arena.conditional(inner_test, null4, Some(c));
        let outer = arena.conditional(test, null2, Some(inner));
        assert_eq!(
            arena.print(outer),
            "a == null ? null : (b == null ? null : c)"
        );
    }

    #[test]
    fn deep_clone_copies_every_node() {
        let mut arena = ExprArena::new();
        let a = arena.read_var("a");
        let b = arena.prop(a, "b");
        let f = arena.read_var("f");
        let call = arena.invoke(f, vec![b]);
        let before = arena.len();
        let copy = arena.deep_clone(call);
        // Four fresh nodes, structurally identical rendering.
        assert_eq!(arena.len(), before + 4);
        assert_ne!(copy, call);
        assert_eq!(arena.print(copy), arena.print(call));
    }

    #[test]
    #[should_panic(expected = "set_safe_ternary_body")]
    fn body_slot_writer_rejects_non_ternary() {
        let mut arena = ExprArena::new();
        let a = arena.read_var("a");
        let b = arena.read_var("b");
        arena.set_safe_ternary_body(a, b);
    }
}
