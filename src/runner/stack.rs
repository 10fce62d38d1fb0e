//! Native stack management for the recursive parts of the engine.
//!
//! Parsing, evaluation and value conversion all recurse on the shape of the
//! script. Each recursive entry point runs through [`guarded`], which moves
//! onto a freshly allocated stack segment when the current one runs low, so
//! depth is bounded by the configured limits instead of the thread's stack.

/// Remaining stack below which a new segment is allocated.
pub const STACK_RED_ZONE: usize = 256 * 1024;

/// Size of each additional segment.
pub const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Stack given to the PEG parser, whose recursion is not instrumented.
pub const PARSER_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Run `f`, first growing the stack if fewer than [`STACK_RED_ZONE`] bytes remain.
#[inline]
pub fn guarded<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, f)
}

/// Run `f` on a dedicated stack of `size` bytes.
pub fn with_stack<R>(size: usize, f: impl FnOnce() -> R) -> R {
    stacker::grow(size, f)
}
