//! Memory map and machine limits.
//!
//! The constants form the contract with user programs: text at the bottom,
//! read-only data, static data, then a heap growing up and a stack growing
//! down from `STACK_END`.

pub const TEXT_BEGIN: u32 = 0x0000_0000;
pub const CONST_BEGIN: u32 = 0x0001_0000;
pub const STATIC_BEGIN: u32 = 0x1000_0000;
pub const HEAP_BEGIN: u32 = 0x1004_0000;
pub const STACK_END: u32 = 0x7FFF_FFF0;

/// First address past the simulated address space. Accesses at or beyond
/// this raise `SimError::Access`.
pub const MEMORY_LIMIT: u64 = 0x8000_0000;

/// How many step diffs the undo journal retains before discarding the
/// oldest.
pub const UNDO_LIMIT: usize = 1_000;

/// Step limit used by `Simulator::run` so a runaway loop cannot hang the
/// host.
pub const DEFAULT_FUEL: u64 = 10_000_000;
