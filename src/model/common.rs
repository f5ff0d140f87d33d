use serde::{Deserialize, Serialize};
use itertools::Itertools;
use serde_json::{Map, Value};

/// A stored document. Always a JSON object at rest; kept as a `Value`
/// so callers can work with arbitrary shapes.
pub type Document = Value;

/// The raw, string-keyed bag parsed from an inbound query string.
/// Values are usually strings but nested objects are allowed (bracket
/// syntax parsers produce them).
pub type QueryBag = Map<String, Value>;

/// Control parameters in a query bag; never treated as filter constraints.
pub const RESERVED_QUERY_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Internal revision counter maintained by the store. Excluded from
/// results unless a projection asks for it.
pub const REVISION_FIELD: &str = "_rev";

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    Include,
    Exclude,
}

/// One entry of a field-selection spec. The store's native convention
/// is a plain string with a `-` prefix meaning exclusion; that magic
/// prefix is confined to [`FieldSelect::parse`] and
/// [`FieldSelect::to_token`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelect {
    pub field: String,
    pub mode: FieldMode,
}

impl FieldSelect {
    pub fn include(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            mode: FieldMode::Include,
        }
    }

    pub fn exclude(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            mode: FieldMode::Exclude,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(rest) => Self::exclude(rest),
            None => Self::include(raw),
        }
    }

    pub fn to_token(&self) -> String {
        match self.mode {
            FieldMode::Include => self.field.clone(),
            FieldMode::Exclude => format!("-{}", self.field),
        }
    }
}

/// Reference to one document collection plus the field selection
/// applied whenever documents from it are returned. Constructed per
/// request and immutable for the duration of one operation.
///
/// Mixing include and exclude entries is not validated here; the
/// store's projection semantics decide precedence.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelHandle {
    pub collection: String,
    pub exempt: Vec<FieldSelect>,
}

impl ModelHandle {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            exempt: Vec::new(),
        }
    }

    /// Build a handle from the store's `-field` string convention.
    pub fn with_exempt<T: AsRef<str>>(collection: impl Into<String>, exempt: &[T]) -> Self {
        Self {
            collection: collection.into(),
            exempt: exempt.iter().map(|f| FieldSelect::parse(f.as_ref())).collect(),
        }
    }

    /// Space-joined projection string for the store boundary, or `None`
    /// when no selection is configured.
    pub fn projection(&self) -> Option<String> {
        if self.exempt.is_empty() {
            return None;
        }
        Some(self.exempt.iter().map(FieldSelect::to_token).join(" "))
    }
}
