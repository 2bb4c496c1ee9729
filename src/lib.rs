//! Template expression IR and the passes that lower null-safe accesses.
//!
//! A safe access (`a?.b`, `a?.[k]`, `a?.()`) must yield null when its
//! receiver is null or undefined, evaluating every receiver exactly once.
//! This crate models the expression IR such accesses appear in and rewrites
//! them into explicit null-guarded conditionals in two sweeps: chain
//! expansion ([`passes::expand_safe_reads`]) followed by guard lowering
//! ([`passes::lower_safe_ternaries`]).
//!
//! # Example
//!
//! ```
//! use tplir::{CompatibilityMode, CompilationJob, CompilationUnit, Op};
//!
//! let mut job = CompilationJob::new(CompatibilityMode::Standard);
//! let user = job.arena.read_var("user");
//! let name = job.arena.safe_prop(user, "name");
//! let mut unit = CompilationUnit::new();
//! unit.ops.push(Op::Statement { expr: name });
//! job.units.push(unit);
//!
//! tplir::passes::run(&mut job);
//!
//! let expr = job.units[0].ops[0].expression();
//! assert_eq!(job.arena.print(expr), "user == null ? null : user.name");
//! ```

pub mod expr;
pub mod job;
pub mod passes;
pub mod validate;
pub mod visitor;

pub use expr::{BinaryOp, Expr, ExprArena, ExprId, LiteralValue, TempId, UnaryOp};
pub use job::{CompatibilityMode, CompilationJob, CompilationUnit, Op, TempIdAllocator};
pub use validate::InvariantError;
pub use visitor::TraversalFlags;
