//! Shared utility functions.
//!
//! - `cancel`: the Ctrl-C flag checked between items
//! - `html`: escaping for HTML and XML output
//! - `text`: whitespace, slugs and prefix handling
//! - `url`: host conversion, image ids and article paths

mod cancel;
mod html;
pub mod text;
pub mod url;

pub use cancel::CancelFlag;
pub use html::{decode_entities, html_escape, xml_escape};
