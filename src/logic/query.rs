use std::sync::OnceLock;

use itertools::Itertools;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::CrudResult;
use crate::model::{QueryBag, CREATED_AT_FIELD, RESERVED_QUERY_KEYS, REVISION_FIELD};
use crate::store::pending::PendingFind;

/// Comparison operators accepted in their bare form from clients,
/// either nested (`{"age": {"gte": "5"}}`) or as flat key suffixes
/// (`age_gte=5`).
const COMPARISON_OPS: [&str; 4] = ["gte", "gt", "lte", "lt"];

fn operator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(gte|gt|lte|lt)\b").expect("operator pattern is valid"))
}

/// Fluent modifier chain turning a raw query-parameter bag into
/// filter, projection, pagination and sort configuration on a pending
/// find. Each stage consumes and returns the builder; the builder
/// exclusively owns the pending find until [`Queries::into_query`].
///
/// Stages can be invoked in any order; the reference order is
/// `filter -> limit_fields -> paginate -> sort`.
pub struct Queries {
    query: PendingFind,
    request_query: QueryBag,
}

impl Queries {
    pub fn new(query: PendingFind, request_query: QueryBag) -> Self {
        Self {
            query,
            request_query,
        }
    }

    /// Strip the reserved control keys, rewrite bare comparison-operator
    /// tokens into the store's `$`-prefixed syntax (a whole-word
    /// textual rewrite over the serialized filter, applied at any
    /// nesting depth) and merge the result into the find condition.
    ///
    /// A bag with no non-reserved keys leaves the condition untouched.
    pub fn filter(mut self) -> CrudResult<Self> {
        let mut bag = self.request_query.clone();
        for key in RESERVED_QUERY_KEYS {
            bag.remove(key);
        }
        let bag = nest_operator_suffixes(bag);
        if bag.is_empty() {
            return Ok(self);
        }

        let serialized = serde_json::to_string(&Value::Object(bag))?;
        let rewritten = operator_re().replace_all(&serialized, "$$$1");
        let parsed: Value = serde_json::from_str(&rewritten)?;
        if let Value::Object(filter) = parsed {
            self.query = self.query.filter(filter);
        }
        Ok(self)
    }

    /// Apply the `fields` parameter as a projection, or default to
    /// excluding the store's internal revision field only.
    pub fn limit_fields(mut self) -> Self {
        let spec = match self.request_query.get("fields").and_then(Value::as_str) {
            Some(fields) => fields.split(',').join(" "),
            None => format!("-{}", REVISION_FIELD),
        };
        self.query = self.query.select(&spec);
        self
    }

    /// Compute `skip = (page - 1) * limit` from the `page` and `limit`
    /// parameters. Defaults: page 1, limit 100. Garbage coerces to the
    /// default, it is never an error. The skip computation saturates so
    /// an absurd but parseable page number cannot overflow.
    pub fn paginate(mut self) -> Self {
        let page = coerce_number(self.request_query.get("page"), 1);
        let limit = coerce_number(self.request_query.get("limit"), 100);
        self.query = self
            .query
            .skip(page.saturating_sub(1).saturating_mul(limit))
            .limit(limit);
        self
    }

    /// Apply the `sort` parameter (comma-separated, `-` prefix for
    /// descending), or default to descending creation time.
    pub fn sort(mut self) -> Self {
        let spec = match self.request_query.get("sort").and_then(Value::as_str) {
            Some(sort) => sort.split(',').join(" "),
            None => format!("-{}", CREATED_AT_FIELD),
        };
        self.query = self.query.sort(&spec);
        self
    }

    /// Release the configured pending find.
    pub fn into_query(self) -> PendingFind {
        self.query
    }
}

/// Fold flat `stem_op` suffixed keys into nested `{stem: {op: value}}`
/// constraints so the textual operator rewrite sees them as whole
/// words. Keys that already carry nested objects pass through as-is.
fn nest_operator_suffixes(bag: QueryBag) -> QueryBag {
    let mut out: Map<String, Value> = Map::new();
    for (key, value) in bag {
        let suffix = key
            .rsplit_once('_')
            .filter(|(stem, op)| !stem.is_empty() && COMPARISON_OPS.contains(op))
            .map(|(stem, op)| (stem.to_string(), op.to_string()));
        match suffix {
            Some((stem, op)) => {
                let entry = out
                    .entry(stem)
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                if let Value::Object(ops) = entry {
                    ops.insert(op, value);
                }
            }
            None => {
                out.insert(key, value);
            }
        }
    }
    out
}

/// Numeric-cast-or-default coercion: strings parse when possible,
/// anything else (including zero, matching the source's falsy check)
/// falls back to the default.
fn coerce_number(value: Option<&Value>, default: u64) -> u64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    match parsed {
        Some(0) | None => default,
        Some(n) => n,
    }
}
