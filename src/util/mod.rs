//! Small utilities: the Horner codec, immutable integer tuples and
//! tuple enumeration helpers.

pub mod horner;
pub mod int_array;
pub mod tuples;
