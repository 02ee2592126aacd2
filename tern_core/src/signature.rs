//! Function type grammar used by the Tern server.
//!
//! Tern describes callables as `fn(name: type, ...) -> type`. Argument types
//! may nest parentheses, brackets and braces, and an argument can appear
//! without a declared name. Parsing is lenient: input the grammar does not
//! cover truncates the argument list instead of failing.

use regex::Regex;
use std::sync::OnceLock;

/// Name used for arguments the server did not name.
pub const UNNAMED_ARGUMENT: &str = "?";

/// Column at which documentation text is wrapped.
const DOC_WRAP_WIDTH: usize = 79;

fn identifier_regex() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER.get_or_init(|| Regex::new(r"^[\w$]+$").expect("identifier pattern is valid"))
}

/// A single argument of a parsed function type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Declared name, or `"?"` when the server gave none.
    pub name: String,
    /// Raw type text, nested structure included.
    pub ty: String,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Structured form of a server function type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignature {
    /// Function name shown in hints.
    pub name: String,
    /// Arguments in declaration order.
    pub args: Vec<Argument>,
    /// Return type, if the type string declared one.
    pub retval: Option<String>,
    /// Documentation text attached by the server.
    pub doc: Option<String>,
    /// External documentation URL attached by the server.
    pub url: Option<String>,
}

impl ParsedSignature {
    /// Replaces the function name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attaches documentation text.
    pub fn with_doc(mut self, doc: Option<String>) -> Self {
        self.doc = doc;
        self
    }

    /// Attaches a documentation URL.
    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    /// Renders the signature as hint text.
    ///
    /// The argument at `argpos` is marked with `*`. Arguments of unknown type
    /// are shown by name only. Documentation follows after a blank line,
    /// wrapped to 79 columns.
    pub fn message(&self, argpos: Option<usize>) -> String {
        let mut msg = format!("{}(", self.name);
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                msg.push_str(", ");
            }
            if argpos == Some(i) {
                msg.push('*');
            }
            msg.push_str(&arg.name);
            if arg.ty != UNNAMED_ARGUMENT {
                msg.push_str(": ");
                msg.push_str(&arg.ty);
            }
        }
        msg.push(')');
        if let Some(ref retval) = self.retval {
            msg.push_str(" -> ");
            msg.push_str(retval);
        }
        if let Some(ref doc) = self.doc {
            msg.push_str("\n\n");
            msg.push_str(&textwrap::fill(doc, DOC_WRAP_WIDTH));
        }
        msg
    }
}

/// Parses a `fn(...)` type string.
///
/// Returns `None` when `raw` is not a function type. The name defaults to
/// `"fn"`; callers that know the expression name replace it with
/// [`ParsedSignature::with_name`].
pub fn parse_function_type(raw: &str) -> Option<ParsedSignature> {
    if !raw.starts_with("fn(") {
        return None;
    }

    let chars: Vec<char> = raw.chars().collect();
    let len = chars.len();
    let text = |start: usize, end: usize| -> String {
        let end = end.min(len);
        chars[start.min(end)..end].iter().collect()
    };

    let mut args = Vec::new();
    let mut pos = 3;

    while pos < len && chars[pos] != ')' {
        let mut name = UNNAMED_ARGUMENT.to_string();
        if let Some(colon) = chars[pos..].iter().position(|&c| c == ':').map(|i| pos + i) {
            let candidate = text(pos, colon);
            if identifier_regex().is_match(&candidate) {
                name = candidate;
                pos = (colon + 2).min(len);
            }
        }

        let type_start = pos;
        let mut depth = 0usize;
        while pos < len {
            match chars[pos] {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                ',' if depth == 0 => break,
                _ => {}
            }
            pos += 1;
        }
        args.push(Argument::new(name, text(type_start, pos)));

        if pos < len && chars[pos] == ',' {
            pos += 2;
        } else {
            // A closer or the end of input; nothing after it is an argument.
            break;
        }
    }

    let retval = if text(pos, pos + 5) == ") -> " {
        Some(text(pos + 5, len))
    } else {
        None
    };

    Some(ParsedSignature {
        name: "fn".to_string(),
        args,
        retval,
        doc: None,
        url: None,
    })
}

/// Extracts the bare argument tokens of a `fn(...)` type string.
///
/// Tokens keep the optional marker (`b?`). A declared type after a
/// top-level `:` is skipped up to the next top-level comma. Only the text up
/// to the first `)` is considered.
pub fn extract_argument_names(raw: &str) -> Vec<String> {
    let inner = raw.get(3..).unwrap_or("");
    let inner = match inner.find(')') {
        Some(close) => &inner[..close],
        None => inner,
    };

    let chars: Vec<char> = inner.chars().chain(std::iter::once(',')).collect();
    let mut names = Vec::new();
    let mut arg_start = 0;
    let mut depth = 0i32;
    let mut has_type = false;

    for (arg_end, &ch) in chars.iter().enumerate() {
        match ch {
            ',' if depth == 0 => {
                if has_type {
                    has_type = false;
                } else if arg_start < arg_end {
                    names.push(chars[arg_start..arg_end].iter().collect());
                }
                arg_start = arg_end + 1;
            }
            ':' if depth == 0 => {
                has_type = true;
                names.push(chars[arg_start.min(arg_end)..arg_end].iter().collect());
            }
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            ' ' => arg_start = arg_end + 1,
            _ => {}
        }
    }

    names
}
