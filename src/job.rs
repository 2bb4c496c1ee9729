//! Compilation job and unit structure consumed by the expression passes.
//!
//! A [`CompilationJob`] owns the expression arena, the units being compiled,
//! the temporary-id allocator and the compatibility mode. The passes only
//! consume this surface: iteration over units and their instructions, fresh
//! temporary ids, and the read-only mode flag.

use crate::expr::{ExprArena, ExprId, TempId};

/// Output-shape compatibility switch.
///
/// `Legacy` reproduces an older code generator's output byte for byte; the
/// one observable difference is the self-assignment wrapper it places around
/// deduplicated temporary reads during safe-chain expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibilityMode {
    Standard,
    Legacy,
}

/// Allocator for temporary ids: monotonically increasing, never reused.
#[derive(Debug, Default)]
pub struct TempIdAllocator {
    next: u32,
}

impl TempIdAllocator {
    pub fn new() -> Self {
        TempIdAllocator::default()
    }

    pub fn allocate(&mut self) -> TempId {
        let id = TempId(self.next);
        self.next += 1;
        id
    }
}

/// An instruction in a compilation unit. Each kind carries one root
/// expression slot the passes rewrite in place.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Evaluate an expression for its effects.
    Statement { expr: ExprId },
    /// Bind the value of an expression to a named target.
    Bind { target: String, expr: ExprId },
}

impl Op {
    /// Root expression of this instruction.
    pub fn expression(&self) -> ExprId {
        match self {
            Op::Statement { expr } | Op::Bind { expr, .. } => *expr,
        }
    }
}

/// One compilation unit: an ordered list of instructions.
#[derive(Debug, Default)]
pub struct CompilationUnit {
    pub ops: Vec<Op>,
}

impl CompilationUnit {
    pub fn new() -> Self {
        CompilationUnit::default()
    }
}

/// The whole compilation job the passes run over.
#[derive(Debug)]
pub struct CompilationJob {
    pub arena: ExprArena,
    pub units: Vec<CompilationUnit>,
    pub compatibility: CompatibilityMode,
    temps: TempIdAllocator,
}

impl CompilationJob {
    pub fn new(compatibility: CompatibilityMode) -> Self {
        CompilationJob {
            arena: ExprArena::new(),
            units: Vec::new(),
            compatibility,
            temps: TempIdAllocator::new(),
        }
    }

    /// Mint a fresh, globally unique temporary id.
    pub fn allocate_temp(&mut self) -> TempId {
        self.temps.allocate()
    }

    /// Disjoint borrows of the pieces a pass sweep needs at once.
    pub(crate) fn split_mut(
        &mut self,
    ) -> (
        &mut ExprArena,
        &mut TempIdAllocator,
        &mut [CompilationUnit],
    ) {
        (&mut self.arena, &mut self.temps, &mut self.units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_ids_are_monotonic_and_unique() {
        let mut job = CompilationJob::new(CompatibilityMode::Standard);
        let a = job.allocate_temp();
        let b = job.allocate_temp();
        let c = job.allocate_temp();
        assert!(a < b && b < c);
        assert_eq!(a, TempId(0));
        assert_eq!(c, TempId(2));
    }
}
