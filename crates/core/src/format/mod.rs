//! File format tags and the conversion route table.
//!
//! Every conversion the service will perform is declared up front as a
//! `(source, target)` pair in [`ConversionTable`]. Adding support for a new
//! pair is a data change, not a control-flow change: the executor asks the
//! table which converter capability serves a route and dispatches on the
//! answer.

mod table;
mod types;

pub use table::ConversionTable;
pub use types::{Category, ConverterKind, Format, FormatError};
