//! Records exchanged with callers: style definitions read from or applied to
//! documents, extraction reports, and binary resources.

mod report;
mod resource;
mod style;

pub use report::*;
pub use resource::*;
pub use style::*;
