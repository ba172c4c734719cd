//! Local ticket state: the admission set, the miss cache and the snapshot file.

pub mod admission;
pub mod misses;
pub mod snapshot;
