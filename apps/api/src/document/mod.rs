//! Word-processing document handling: load a DOCX, capture its formatting,
//! write rewritten text back with that formatting.

pub mod docx;
pub mod reapply;
pub mod style_map;

#[cfg(test)]
pub mod fixtures;

pub use docx::{DocumentFormatError, DocxDocument};
pub use reapply::{reapply_styles, ReapplyError, StyleMismatchError};
pub use style_map::StyleMap;
