//! Completion entries built from server completion records.

use crate::signature::{extract_argument_names, parse_function_type};

/// Width of the category column in completion hints.
const CATEGORY_WIDTH: usize = 7;

/// A completion ready for the editor's completion list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEntry {
    /// Label displayed in the completion list, with an optional tab-separated icon.
    pub hint: String,
    /// Snippet inserted when the entry is chosen.
    pub replacement: String,
}

impl CompletionEntry {
    /// Builds an entry from a server record's name and type.
    pub fn from_record(name: &str, ty: Option<&str>) -> Self {
        let escaped = escape_snippet(name);

        match ty {
            Some(ty) if ty.starts_with("fn(") => {
                let arguments = extract_argument_names(ty);
                let ellipsis = if arguments.is_empty() { "" } else { "…" };
                let mut hint = format!("{:<width$} {} ({})", "func", name, ellipsis, width = CATEGORY_WIDTH);
                let retval = parse_function_type(ty).and_then(|sig| sig.retval);
                append_icon(&mut hint, retval.as_deref());

                Self {
                    hint,
                    replacement: escaped + &argument_snippet(&arguments),
                }
            }
            _ => {
                let mut hint = format!("{:<width$} {}", "var", name, width = CATEGORY_WIDTH);
                append_icon(&mut hint, ty);
                Self {
                    hint,
                    replacement: escaped,
                }
            }
        }
    }

    /// Returns true if the inserted text starts with `prefix`.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.replacement.starts_with(prefix)
    }
}

fn append_icon(hint: &mut String, ty: Option<&str>) {
    let icon = completion_icon(ty);
    if !icon.is_empty() {
        hint.push('\t');
        hint.push_str(icon);
    }
}

/// Maps a server type to the icon name shown beside a completion.
pub fn completion_icon(ty: Option<&str>) -> &'static str {
    match ty {
        None => "",
        Some("?") => "?",
        Some(t) if t.starts_with("fn(") => "Function",
        Some(t) if t.starts_with('[') => "Array",
        Some("number") => "Number",
        Some("string") => "String",
        Some("bool") => "Boolean",
        Some(_) => "Object",
    }
}

/// `$` introduces placeholders in snippets, so literal dollars are escaped.
fn escape_snippet(text: &str) -> String {
    text.replace('$', "\\$")
}

/// Builds the parenthesised argument list with tab-stop placeholders.
///
/// An empty list still gets a placeholder so that one tab always leaves the
/// call. Optional arguments (`name?`) carry their separator inside an outer
/// placeholder, so deleting the placeholder also deletes the comma.
pub fn argument_snippet(arguments: &[String]) -> String {
    if arguments.is_empty() {
        return "${1:()}".to_string();
    }

    let mut snippet = String::from("(");
    let mut index = 1;

    for argument in arguments {
        let argument = escape_snippet(argument);
        let separator = if index > 1 { ", " } else { "" };

        if argument.ends_with('?') {
            snippet.push_str(&format!(
                "${{{}:{}${{{}:{}}}}}",
                index,
                separator,
                index + 1,
                argument
            ));
            index += 2;
        } else {
            snippet.push_str(&format!("{}${{{}:{}}}", separator, index, argument));
            index += 1;
        }
    }

    snippet.push(')');
    snippet
}
