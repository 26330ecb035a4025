/*!
A calculator core for finite universal algebra.

Given a finite algebra — a carrier `{0..n-1}` with finitary operations —
this crate computes the derived structures of interest to universal
algebraists: closures of generating sets (with term witnesses),
principal congruences, the full congruence lattice, the subalgebra
lattice, and interpretations of terms as operations. Algebras can be
built programmatically, derived from other algebras (subalgebra,
quotient, product, power), or loaded from the XML file format.

```
use finalg::{Operation, OperationSymbol, SmallAlgebra};

let add = Operation::computed(OperationSymbol::new("add", 2), 3, |a| {
    Ok((a[0] + a[1]) % 3)
})?;
let z3 = SmallAlgebra::new("z3", 3, vec![add])?;
assert!(z3.cg(0, 1)?.is_one()); // z3 is simple
assert_eq!(z3.con()?.size(), 2);
# Ok::<(), finalg::CalcError>(())
```

Long-running computations accept a [`TaskContext`] for cancellation and
progress reporting.
*/

pub mod alg;
pub mod error;
pub mod io;
pub mod lat;
pub mod progress;
pub mod term;
pub mod util;

pub use alg::closer::{Closer, PowerCloser};
pub use alg::conlat::{cg, cg_partition, cg_sweep, CongruenceLattice, Partition};
pub use alg::op::{Operation, OperationSymbol, MAX_OPERATION_ARITY};
pub use alg::sublat::SubalgebraLattice;
pub use alg::SmallAlgebra;
pub use error::{CalcError, CalcResult, FileErrorKind};
pub use io::{read_algebra, read_algebra_str, write_algebra, write_algebra_string};
pub use lat::FiniteOrder;
pub use progress::{CancelToken, NoProgress, ProgressSink, TaskContext};
pub use term::Term;
pub use util::int_array::IntArray;
