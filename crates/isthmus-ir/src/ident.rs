//! Identifier casing.
//!
//! IDL identifiers are written in `snake_case`. Each target renders them in
//! its own convention (`PascalCase` types, `camelCase` methods, ...), which
//! is configured per identifier category with an [`IdentifierStyle`].

use serde::{Deserialize, Serialize};

/// The casing convention applied to an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Case {
    /// Leave the identifier untouched.
    #[serde(rename = "none")]
    #[default]
    None,
    #[serde(rename = "camelCase")]
    Camel,
    #[serde(rename = "PascalCase")]
    Pascal,
    #[serde(rename = "snake_case")]
    Snake,
    #[serde(rename = "kebab-case")]
    Kebab,
    #[serde(rename = "TRAIN_CASE")]
    Train,
}

/// A casing convention plus an optional prefix (e.g. `m_` or `I`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "StyleRepr")]
pub struct IdentifierStyle {
    pub style: Case,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Accepts either a bare case name or a `{ style, prefix }` table.
#[derive(Deserialize)]
#[serde(untagged)]
enum StyleRepr {
    Bare(Case),
    Full {
        style: Case,
        #[serde(default)]
        prefix: Option<String>,
    },
}

impl From<StyleRepr> for IdentifierStyle {
    fn from(repr: StyleRepr) -> Self {
        match repr {
            StyleRepr::Bare(style) => Self { style, prefix: None },
            StyleRepr::Full { style, prefix } => Self { style, prefix },
        }
    }
}

impl From<Case> for IdentifierStyle {
    fn from(style: Case) -> Self {
        Self { style, prefix: None }
    }
}

impl IdentifierStyle {
    pub fn new(style: Case) -> Self {
        style.into()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Render a `snake_case` IDL identifier in this style.
    pub fn apply(&self, identifier: &str) -> String {
        let body = convert(identifier, self.style);
        match &self.prefix {
            Some(prefix) => format!("{prefix}{body}"),
            None => body,
        }
    }
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Convert a `snake_case` identifier to the given case.
pub fn convert(identifier: &str, case: Case) -> String {
    if case == Case::None {
        return identifier.to_string();
    }
    let tokens: Vec<&str> = identifier.split('_').filter(|t| !t.is_empty()).collect();
    if tokens.is_empty() {
        return identifier.to_string();
    }
    match case {
        Case::None => identifier.to_string(),
        Case::Snake => tokens.iter().map(|t| t.to_lowercase()).collect::<Vec<_>>().join("_"),
        Case::Kebab => tokens.iter().map(|t| t.to_lowercase()).collect::<Vec<_>>().join("-"),
        Case::Train => tokens.iter().map(|t| t.to_uppercase()).collect::<Vec<_>>().join("_"),
        Case::Pascal => tokens.iter().map(|t| capitalize(t)).collect(),
        Case::Camel => {
            let mut out = tokens[0].to_lowercase();
            for token in &tokens[1..] {
                out.push_str(&capitalize(token));
            }
            out
        }
    }
}
