//! Rewrite passes over the template IR.
//!
//! [`run`] is the entry point used after a job's expressions are built:
//! safe-chain expansion first, then ternary lowering over its output. The
//! two sweeps never interleave.

mod expand_safe_reads;
mod lower_safe_ternaries;

pub use expand_safe_reads::expand_safe_reads;
pub use lower_safe_ternaries::lower_safe_ternaries;

use crate::job::CompilationJob;

/// Expand every safe access in the job, then lower the resulting guards to
/// plain conditionals. In debug builds the output invariants are re-checked
/// afterwards; a violation is a bug in the passes and aborts immediately.
pub fn run(job: &mut CompilationJob) {
    expand_safe_reads(job);
    lower_safe_ternaries(job);

    #[cfg(debug_assertions)]
    if let Err(violation) = crate::validate::check_lowered(job) {
        panic!("safe-read lowering broke an IR invariant: {violation}");
    }
}
