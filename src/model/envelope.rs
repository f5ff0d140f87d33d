use serde::Serialize;
use serde_json::{json, Value};

/// Uniform success envelope returned by every CRUD operation.
///
/// `doc_length` is populated only by the multi-document fetch path and
/// is omitted from the wire shape everywhere else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrudResponse<T> {
    pub message: String,
    pub data: T,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_length: Option<usize>,
}

impl<T> CrudResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
            success: true,
            doc_length: None,
        }
    }

    pub fn with_doc_length(mut self, doc_length: usize) -> Self {
        self.doc_length = Some(doc_length);
        self
    }
}

/// Failure shape rendered for the wire. `stack` is attached only when
/// the caller decided to expose it (non-production mode).
pub fn failure_message(message: &str, error: &str, stack: Option<String>) -> Value {
    let mut body = json!({
        "message": message,
        "error": error,
        "success": false,
    });
    if let Some(stack) = stack {
        body["stack"] = Value::String(stack);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_length_is_omitted_unless_set() {
        let rendered = serde_json::to_value(CrudResponse::ok("Successfully created", json!({"a": 1}))).unwrap();
        assert_eq!(rendered["success"], json!(true));
        assert!(rendered.get("doc_length").is_none());

        let rendered =
            serde_json::to_value(CrudResponse::ok("Data fetched successfully", json!([])).with_doc_length(1))
                .unwrap();
        assert_eq!(rendered["doc_length"], json!(1));
    }

    #[test]
    fn failure_shape_gates_stack() {
        let body = failure_message("bad", "boom", None);
        assert_eq!(body["success"], json!(false));
        assert!(body.get("stack").is_none());

        let body = failure_message("bad", "boom", Some("trace".into()));
        assert_eq!(body["stack"], json!("trace"));
    }
}
