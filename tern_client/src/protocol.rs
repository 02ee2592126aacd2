//! Request and response documents of the Tern protocol.
//!
//! Every request is a single JSON object with an optional `query` and a
//! `files` array. This client always sends the whole buffer as one `full`
//! file entry and points the query at it with `#0`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tern_bridge_core::{parse_function_type, ParsedSignature};

/// Reference to the first file of the enclosing document.
pub const IN_FLIGHT_FILE: &str = "#0";

/// The kind of query and its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueryKind {
    /// Completions at the query position.
    Completions { types: bool, filter: bool },
    /// Type of the expression at the query position.
    Type {
        #[serde(rename = "preferFunction")]
        prefer_function: bool,
    },
    /// Definition site of the expression at the query position.
    Definition {
        #[serde(rename = "lineCharPositions")]
        line_char_positions: bool,
    },
    /// Documentation of the expression at the query position.
    Documentation,
}

impl QueryKind {
    pub fn completions() -> Self {
        QueryKind::Completions {
            types: true,
            filter: false,
        }
    }

    pub fn function_type() -> Self {
        QueryKind::Type {
            prefer_function: true,
        }
    }

    pub fn definition() -> Self {
        QueryKind::Definition {
            line_char_positions: true,
        }
    }

    /// Name of the query type, as sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            QueryKind::Completions { .. } => "completions",
            QueryKind::Type { .. } => "type",
            QueryKind::Definition { .. } => "definition",
            QueryKind::Documentation => "documentation",
        }
    }
}

/// A query bound to a file and position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(flatten)]
    pub kind: QueryKind,
    pub file: String,
    pub end: usize,
}

/// A file sent along with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Always `"full"`: the complete buffer text.
    #[serde(rename = "type")]
    pub kind: String,
    /// Path relative to the project root.
    pub name: String,
    pub text: String,
}

impl FileEntry {
    pub fn full(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: "full".to_string(),
            name: name.into(),
            text: text.into(),
        }
    }
}

/// A request document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    pub files: Vec<FileEntry>,
}

impl Document {
    /// A query against the full text of one buffer.
    pub fn query(kind: QueryKind, end: usize, file: FileEntry) -> Self {
        Self {
            query: Some(Query {
                kind,
                file: IN_FLIGHT_FILE.to_string(),
                end,
            }),
            files: vec![file],
        }
    }

    /// A document that only updates the server's copy of a buffer.
    pub fn push(file: FileEntry) -> Self {
        Self {
            query: None,
            files: vec![file],
        }
    }

    pub fn to_value(&self) -> Value {
        // Plain structs of strings and integers always serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One entry of a completions response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompletionRecord {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: Option<String>,
}

/// Response to a `completions` query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompletionsResponse {
    /// Offset where the completed token starts.
    pub start: usize,
    #[serde(default)]
    pub end: Option<usize>,
    pub completions: Vec<CompletionRecord>,
}

/// Response to a `type` or `documentation` query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TypeResponse {
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "exprName")]
    pub expr_name: Option<String>,
    pub doc: Option<String>,
    pub url: Option<String>,
}

impl TypeResponse {
    /// Parses the reported type as a function signature.
    ///
    /// The signature is named after the expression, then the type's own
    /// name, then `fn`.
    pub fn signature(&self) -> Option<ParsedSignature> {
        let signature = parse_function_type(self.ty.as_deref()?)?;
        let name = [&self.expr_name, &self.name]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
            .map_or("fn", String::as_str);
        Some(
            signature
                .with_name(name)
                .with_doc(self.doc.clone())
                .with_url(self.url.clone()),
        )
    }
}

/// A line/character position in a definition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LineChar {
    pub line: usize,
    pub ch: usize,
}

/// Response to a `definition` query with `lineCharPositions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DefinitionResponse {
    pub file: Option<String>,
    pub start: Option<LineChar>,
    pub end: Option<LineChar>,
}
