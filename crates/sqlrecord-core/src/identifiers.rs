//! Identifier helpers: quoting and model-name/column-name case conversion.

use std::sync::OnceLock;

use regex::Regex;

/// Quote an identifier with ANSI double quotes, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn camel_boundary() -> Option<&'static Regex> {
    static BOUNDARY: OnceLock<Option<Regex>> = OnceLock::new();
    BOUNDARY
        .get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])|([A-Z])([A-Z][a-z])").ok())
        .as_ref()
}

/// `RobotsParts` → `robots_parts`.
///
/// Used to derive a model's default source table from its name.
pub fn uncamelize(name: &str) -> String {
    let Some(boundary) = camel_boundary() else {
        return name.to_lowercase();
    };
    // Run twice so overlapping boundaries ("ABc" after "aB") are all split.
    let once = boundary.replace_all(name, "${1}${3}_${2}${4}");
    let twice = boundary.replace_all(&once, "${1}${3}_${2}${4}");
    twice.to_lowercase()
}

/// `robot_type` → `RobotType`.
pub fn camelize(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect()
}
