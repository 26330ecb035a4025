/*!
XML algebra file reader.

The format has an `<algebra>` root with a single algebra-kind child;
only `<basicAlgebra>` is readable. Inside: `<algName>` (required),
`<desc>` (optional), `<cardinality>` (required, positive) and an
optional `<operations>` list. Each `<op>` carries an `<opSymbol>`
(`<opName>` and `<arity>`) and an `<opTable>` whose `<intArray>` holds
`n` rows labelled `r="[0]"` through `r="[n-1]"`; row `j` is the slice of
the Horner-ordered flat table whose most significant digit is `j`, so a
row has `n^(arity-1)` comma-separated entries and the concatenation of
the rows is exactly the table.

The parser is a flat event loop over `quick-xml` with a tag stack;
structural problems surface as `BadFile` errors with a kind and byte
offset.
*/

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::alg::op::{Operation, OperationSymbol};
use crate::alg::SmallAlgebra;
use crate::error::{CalcError, CalcResult, FileErrorKind};
use crate::util::horner;

/// Read a single algebra from a file.
pub fn read_algebra(path: impl AsRef<Path>) -> CalcResult<SmallAlgebra> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    parse(&data).map_err(|e| e.with_path(path))
}

/// Read a single algebra from a string.
pub fn read_algebra_str(xml: &str) -> CalcResult<SmallAlgebra> {
    parse(xml.as_bytes())
}

fn bad(kind: FileErrorKind, message: impl Into<String>, pos: usize) -> CalcError {
    CalcError::bad_file(kind, message).at_offset(pos)
}

#[derive(Default)]
struct PendingOp {
    name: Option<String>,
    arity: Option<usize>,
    rows: Vec<(usize, Vec<usize>)>,
}

#[derive(Default)]
struct ParseState {
    stack: Vec<String>,
    text: String,
    algebra_name: Option<String>,
    description: Option<String>,
    cardinality: Option<usize>,
    kind_seen: bool,
    current_row: Option<usize>,
    op: PendingOp,
    operations: Vec<Operation>,
    algebra: Option<SmallAlgebra>,
}

pub(crate) fn parse(data: &[u8]) -> CalcResult<SmallAlgebra> {
    let mut reader = Reader::from_reader(data);
    reader.trim_text(true);
    let mut state = ParseState::default();
    let mut buf = Vec::new();

    loop {
        let pos = reader.buffer_position();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                state.text.clear();
                if state.stack.last().map(String::as_str) == Some("algebra") {
                    if name != "basicAlgebra" {
                        return Err(bad(
                            FileErrorKind::UnsupportedKind,
                            format!("algebra kind <{}> is not supported", name),
                            pos,
                        ));
                    }
                    if state.kind_seen {
                        return Err(bad(
                            FileErrorKind::Malformed,
                            "more than one algebra-kind element",
                            pos,
                        ));
                    }
                    state.kind_seen = true;
                }
                match name.as_str() {
                    "op" => state.op = PendingOp::default(),
                    "row" => {
                        let label = e
                            .try_get_attribute("r")
                            .map_err(|err| {
                                bad(FileErrorKind::Malformed, err.to_string(), pos)
                            })?
                            .ok_or_else(|| {
                                bad(FileErrorKind::Malformed, "row without r attribute", pos)
                            })?;
                        let label = label.unescape_value().map_err(|err| {
                            bad(FileErrorKind::Malformed, err.to_string(), pos)
                        })?;
                        state.current_row = Some(parse_row_label(&label, pos)?);
                    }
                    _ => {}
                }
                state.stack.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| bad(FileErrorKind::Malformed, err.to_string(), pos))?;
                state.text.push_str(&text);
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                state.stack.pop();
                finish_element(&name, &mut state, pos)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(bad(FileErrorKind::Malformed, err.to_string(), pos));
            }
        }
        buf.clear();
    }

    state.algebra.ok_or_else(|| {
        CalcError::bad_file(FileErrorKind::MissingElement, "no <algebra> element found")
    })
}

fn parse_row_label(label: &str, pos: usize) -> CalcResult<usize> {
    let inner = label
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| {
            bad(
                FileErrorKind::Malformed,
                format!("row label {:?} is not of the form [i]", label),
                pos,
            )
        })?;
    inner.parse::<usize>().map_err(|_| {
        bad(
            FileErrorKind::Malformed,
            format!("row label {:?} is not an index", label),
            pos,
        )
    })
}

fn parse_usize(text: &str, what: &str, pos: usize) -> CalcResult<usize> {
    text.trim().parse::<usize>().map_err(|_| {
        bad(
            FileErrorKind::Malformed,
            format!("{} {:?} is not a nonnegative integer", what, text.trim()),
            pos,
        )
    })
}

fn finish_element(name: &str, state: &mut ParseState, pos: usize) -> CalcResult<()> {
    match name {
        "algName" => {
            let text = state.text.trim();
            if text.is_empty() {
                return Err(bad(FileErrorKind::Malformed, "empty <algName>", pos));
            }
            state.algebra_name = Some(text.to_string());
        }
        "desc" => {
            state.description = Some(state.text.trim().to_string());
        }
        "cardinality" => {
            let n = parse_usize(&state.text, "cardinality", pos)?;
            if n == 0 {
                return Err(bad(
                    FileErrorKind::ValueOutOfRange,
                    "cardinality must be positive",
                    pos,
                ));
            }
            state.cardinality = Some(n);
        }
        "opName" => {
            state.op.name = Some(state.text.trim().to_string());
        }
        "arity" => {
            state.op.arity = Some(parse_usize(&state.text, "arity", pos)?);
        }
        "row" => {
            let index = state.current_row.take().ok_or_else(|| {
                bad(FileErrorKind::Malformed, "row outside of an intArray", pos)
            })?;
            let mut values = Vec::new();
            let text = state.text.trim();
            if !text.is_empty() {
                for part in text.split(',') {
                    values.push(parse_usize(part, "table entry", pos)?);
                }
            }
            state.op.rows.push((index, values));
        }
        "op" => {
            let op = std::mem::take(&mut state.op);
            let op_name = op.name.ok_or_else(|| {
                bad(FileErrorKind::MissingElement, "op without <opName>", pos)
            })?;
            let arity = op.arity.ok_or_else(|| {
                bad(FileErrorKind::MissingElement, "op without <arity>", pos)
            })?;
            let n = state.cardinality.ok_or_else(|| {
                bad(
                    FileErrorKind::MissingElement,
                    "operations listed before <cardinality>",
                    pos,
                )
            })?;
            let table = assemble_table(&op_name, arity, n, op.rows, pos)?;
            let operation =
                Operation::from_table(OperationSymbol::new(op_name, arity), n, table)?;
            state.operations.push(operation);
        }
        "basicAlgebra" => {
            let name = state.algebra_name.take().ok_or_else(|| {
                bad(
                    FileErrorKind::MissingElement,
                    "basicAlgebra without <algName>",
                    pos,
                )
            })?;
            let n = state.cardinality.ok_or_else(|| {
                bad(
                    FileErrorKind::MissingElement,
                    "basicAlgebra without <cardinality>",
                    pos,
                )
            })?;
            let operations = std::mem::take(&mut state.operations);
            let mut algebra = SmallAlgebra::new(name, n, operations)?;
            if let Some(desc) = state.description.take() {
                algebra = algebra.with_description(desc);
            }
            state.algebra = Some(algebra);
        }
        "algebra" => {
            if state.algebra.is_none() {
                return Err(bad(
                    FileErrorKind::MissingElement,
                    "<algebra> without a basicAlgebra child",
                    pos,
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Stitch the labelled rows back into the flat Horner-ordered table.
fn assemble_table(
    op_name: &str,
    arity: usize,
    n: usize,
    mut rows: Vec<(usize, Vec<usize>)>,
    pos: usize,
) -> CalcResult<Vec<usize>> {
    let row_count = if arity == 0 { 1 } else { n };
    let row_len = horner::table_size(arity.saturating_sub(1), n)?;
    if rows.len() != row_count {
        return Err(bad(
            FileErrorKind::Malformed,
            format!(
                "operation {} needs {} rows, got {}",
                op_name,
                row_count,
                rows.len()
            ),
            pos,
        ));
    }
    rows.sort_by_key(|(index, _)| *index);
    let mut table = Vec::with_capacity(row_count * row_len);
    for (expected, (index, values)) in rows.into_iter().enumerate() {
        if index != expected {
            return Err(bad(
                FileErrorKind::Malformed,
                format!(
                    "operation {} rows are labelled irregularly: expected [{}], got [{}]",
                    op_name, expected, index
                ),
                pos,
            ));
        }
        if values.len() != row_len {
            return Err(bad(
                FileErrorKind::Malformed,
                format!(
                    "operation {} row [{}] has {} entries, expected {}",
                    op_name,
                    index,
                    values.len(),
                    row_len
                ),
                pos,
            ));
        }
        if let Some(&v) = values.iter().find(|&&v| v >= n) {
            return Err(bad(
                FileErrorKind::ValueOutOfRange,
                format!(
                    "operation {} row [{}] contains {} outside [0, {})",
                    op_name, index, v, n
                ),
                pos,
            ));
        }
        table.extend(values);
    }
    Ok(table)
}
