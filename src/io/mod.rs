//! Reading and writing the XML algebra file format.

pub mod reader;
pub mod writer;

pub use reader::{read_algebra, read_algebra_str};
pub use writer::{write_algebra, write_algebra_string};
