use serde::{Deserialize, Serialize};

/// One referenced-document expansion request: which path on the
/// primary result to expand, optionally which fields of the expanded
/// document to keep, optionally one further expansion level.
///
/// An entry with an empty or missing `path` is a no-op and is skipped,
/// never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulateField {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_layer_populate: Option<SecondLayer>,
}

impl PopulateField {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_fields<T: Into<String>>(mut self, fields: Vec<T>) -> Self {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_second_layer(mut self, second: SecondLayer) -> Self {
        self.second_layer_populate = Some(second);
        self
    }
}

/// Second-level expansion descriptor: either a bare path string or a
/// full nested spec. Passed through to the store unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecondLayer {
    Path(String),
    Spec(Box<PopulateField>),
}

/// Single-or-array populate input. Callers may hand over one spec or a
/// list; everything downstream normalizes through [`PopulateArg::into_vec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PopulateArg {
    Many(Vec<PopulateField>),
    One(PopulateField),
}

impl PopulateArg {
    pub fn into_vec(self) -> Vec<PopulateField> {
        match self {
            PopulateArg::Many(fields) => fields,
            PopulateArg::One(field) => vec![field],
        }
    }
}

impl From<PopulateField> for PopulateArg {
    fn from(field: PopulateField) -> Self {
        PopulateArg::One(field)
    }
}

impl From<Vec<PopulateField>> for PopulateArg {
    fn from(fields: Vec<PopulateField>) -> Self {
        PopulateArg::Many(fields)
    }
}
