//! Algebras and the structures derived from them.

pub mod algebra;
pub mod closer;
pub mod conlat;
pub mod op;
pub mod sublat;

pub use algebra::SmallAlgebra;
pub use closer::{Closer, PowerCloser};
pub use conlat::{CongruenceLattice, Partition};
pub use op::{Operation, OperationSymbol};
pub use sublat::SubalgebraLattice;
