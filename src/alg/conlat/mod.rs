//! Partitions, principal congruences and the congruence lattice.

pub mod cg;
pub mod lattice;
pub mod partition;

pub use cg::{cg, cg_partition, cg_partition_with, cg_sweep, cg_with};
pub use lattice::CongruenceLattice;
pub use partition::Partition;
