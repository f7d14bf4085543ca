mod entries;
mod escape;
mod script;

pub use entries::{expand_values, parse_entries, Entry};
pub use escape::{escaped_string, format_command, format_script};
pub use script::parse;
