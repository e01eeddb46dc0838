pub mod legacy;
pub mod line;
pub mod sexp;

pub use line::{scan_line, LineForm, Placement, PropertyLine, TableRecord};
pub use sexp::{ParseError, SExp, SExpParser};
