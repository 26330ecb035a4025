/*!
XML algebra file writer.

Produces the canonical form of the format read by [`crate::io::reader`]:
two-space indentation, operations in algebra order, each operation table
chunked into `n` rows of the Horner-ordered flat table. Reading a
written file yields an observationally equal algebra, and writing what
was read from a canonical file reproduces it byte for byte.
*/

use std::fmt::Write as _;
use std::path::Path;

use crate::alg::SmallAlgebra;
use crate::error::CalcResult;
use crate::util::horner;

/// Write `algebra` to a file in canonical form.
pub fn write_algebra(path: impl AsRef<Path>, algebra: &SmallAlgebra) -> CalcResult<()> {
    let text = write_algebra_string(algebra)?;
    std::fs::write(path.as_ref(), text)?;
    Ok(())
}

/// Render `algebra` as a canonical algebra file.
pub fn write_algebra_string(algebra: &SmallAlgebra) -> CalcResult<String> {
    let mut out = String::new();
    let n = algebra.cardinality();
    out.push_str("<?xml version=\"1.0\"?>\n");
    out.push_str("<algebra>\n");
    out.push_str("  <basicAlgebra>\n");
    let _ = writeln!(out, "    <algName>{}</algName>", escape(algebra.name()));
    if let Some(desc) = algebra.description() {
        let _ = writeln!(out, "    <desc>{}</desc>", escape(desc));
    }
    let _ = writeln!(out, "    <cardinality>{}</cardinality>", n);
    if !algebra.operations().is_empty() {
        out.push_str("    <operations>\n");
        for op in algebra.operations() {
            out.push_str("      <op>\n");
            out.push_str("        <opSymbol>\n");
            let _ = writeln!(
                out,
                "          <opName>{}</opName>",
                escape(op.symbol().name())
            );
            let _ = writeln!(out, "          <arity>{}</arity>", op.arity());
            out.push_str("        </opSymbol>\n");
            out.push_str("        <opTable>\n");
            out.push_str("          <intArray>\n");
            let table = op.table()?;
            let row_count = if op.arity() == 0 { 1 } else { n };
            let row_len = horner::table_size(op.arity().saturating_sub(1), n)?;
            for row in 0..row_count {
                let entries: Vec<String> = table[row * row_len..(row + 1) * row_len]
                    .iter()
                    .map(|v| v.to_string())
                    .collect();
                let _ = writeln!(
                    out,
                    "            <row r=\"[{}]\">{}</row>",
                    row,
                    entries.join(",")
                );
            }
            out.push_str("          </intArray>\n");
            out.push_str("        </opTable>\n");
            out.push_str("      </op>\n");
        }
        out.push_str("    </operations>\n");
    }
    out.push_str("  </basicAlgebra>\n");
    out.push_str("</algebra>\n");
    Ok(out)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::op::{Operation, OperationSymbol};
    use crate::io::reader::parse;

    fn two_element_lattice() -> SmallAlgebra {
        let join = Operation::computed(OperationSymbol::new("join", 2), 2, |a| {
            Ok(a[0] | a[1])
        })
        .unwrap();
        let meet = Operation::computed(OperationSymbol::new("meet", 2), 2, |a| {
            Ok(a[0] & a[1])
        })
        .unwrap();
        SmallAlgebra::new("lat2", 2, vec![join, meet])
            .unwrap()
            .with_description("two element lattice")
    }

    #[test]
    fn written_files_read_back_observably_equal() {
        let alg = two_element_lattice();
        let text = write_algebra_string(&alg).unwrap();
        let back = parse(text.as_bytes()).unwrap();
        assert_eq!(back.name(), alg.name());
        assert_eq!(back.description(), alg.description());
        assert_eq!(back.cardinality(), alg.cardinality());
        assert_eq!(back.operations().len(), alg.operations().len());
        for (a, b) in alg.operations().iter().zip(back.operations()) {
            assert_eq!(a.symbol(), b.symbol());
            assert_eq!(a.table().unwrap(), b.table().unwrap());
        }
    }

    #[test]
    fn writing_is_canonical() {
        let alg = two_element_lattice();
        let first = write_algebra_string(&alg).unwrap();
        let reread = parse(first.as_bytes()).unwrap();
        let second = write_algebra_string(&reread).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn names_are_escaped() {
        let alg = SmallAlgebra::new("a<b&c", 2, vec![]).unwrap();
        let text = write_algebra_string(&alg).unwrap();
        assert!(text.contains("a&lt;b&amp;c"));
        let back = parse(text.as_bytes()).unwrap();
        assert_eq!(back.name(), "a<b&c");
    }
}
