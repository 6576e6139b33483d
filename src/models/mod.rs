//! Core data models for the combo meta board.

mod filter;
mod images;
mod nav;
mod result_row;

pub use filter::*;
pub use images::*;
pub use nav::*;
pub use result_row::*;
