use crate::document::{Mark, Node};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Template values a consumer substitutes before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderKey {
    /// `{{organization}}`
    Organization,
    /// `{{date}}`. Documents use it for both effective and last-updated dates.
    Date,
    /// `{{supplier_name}}`
    SupplierName,
}

impl PlaceholderKey {
    /// The name between the braces.
    pub fn as_str(self) -> &'static str {
        match self {
            PlaceholderKey::Organization => "organization",
            PlaceholderKey::Date => "date",
            PlaceholderKey::SupplierName => "supplier_name",
        }
    }

    /// Parses the name between the braces of `{{...}}`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "organization" => Some(PlaceholderKey::Organization),
            "date" => Some(PlaceholderKey::Date),
            "supplier_name" => Some(PlaceholderKey::SupplierName),
            _ => None,
        }
    }
}

impl fmt::Display for PlaceholderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{{}}}}}", self.as_str())
    }
}

/// Values to fill placeholders with. Unset keys stay as placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitutions {
    /// Replaces `{{organization}}`.
    #[serde(default)]
    pub organization: Option<String>,
    /// Replaces `{{date}}`, printed as `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Replaces `{{supplier_name}}`.
    #[serde(default)]
    pub supplier_name: Option<String>,
}

impl Substitutions {
    /// The text that replaces `key`, if one was supplied.
    pub fn value_for(&self, key: PlaceholderKey) -> Option<String> {
        let value = match key {
            PlaceholderKey::Organization => self.organization.clone(),
            PlaceholderKey::Date => self.date.map(|d| d.format("%Y-%m-%d").to_string()),
            PlaceholderKey::SupplierName => self.supplier_name.clone(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// True when no value is set.
    pub fn is_empty(&self) -> bool {
        self.organization.is_none() && self.date.is_none() && self.supplier_name.is_none()
    }
}

/// Splits authored text into `text` and `placeholder` leaves.
///
/// Marks are copied onto every piece. Returns the reason on an unknown key
/// or an unterminated `{{`.
pub fn split_placeholders(text: &str, marks: &[Mark]) -> Result<Vec<Node>, String> {
    let mut nodes = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or_else(|| format!("unterminated placeholder in \"{text}\""))?;
        let name = &after_open[..close];
        let key = PlaceholderKey::from_name(name)
            .ok_or_else(|| format!("unknown placeholder '{{{{{name}}}}}'"))?;

        if open > 0 {
            nodes.push(Node::text_with_marks(&rest[..open], marks));
        }
        nodes.push(Node::Placeholder {
            key,
            marks: marks.to_vec(),
        });
        rest = &after_open[close + 2..];
    }

    if !rest.is_empty() {
        nodes.push(Node::text_with_marks(rest, marks));
    }
    Ok(nodes)
}
