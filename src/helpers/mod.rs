//! Small helpers shared by the content, query and server modules

mod date;
mod text;
mod url;

pub use date::*;
pub use text::*;
pub use url::*;
