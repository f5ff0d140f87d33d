use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use serde_json::{json, Map, Value};

use doc_crud_rust::logic::crud;
use doc_crud_rust::model::{Document, ModelHandle, PopulateArg, PopulateField};
use doc_crud_rust::store::{DocumentStore, FindOptions, MemoryStore};
use doc_crud_rust::CrudError;

fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {:?}", other),
    }
}

/// Delegating store that counts single-document lookups, so tests can
/// assert when the existence guard skips its check entirely.
struct CountingStore {
    inner: MemoryStore,
    find_one_calls: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            find_one_calls: AtomicUsize::new(0),
        }
    }

    fn lookups(&self) -> usize {
        self.find_one_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentStore for CountingStore {
    async fn find_one(&self, collection: &str, options: &FindOptions) -> Result<Option<Document>> {
        self.find_one_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one(collection, options).await
    }

    async fn find(&self, collection: &str, options: &FindOptions) -> Result<Vec<Document>> {
        self.inner.find(collection, options).await
    }

    async fn insert_one(&self, collection: &str, data: Document) -> Result<Document> {
        self.inner.insert_one(collection, data).await
    }

    async fn insert_many(&self, collection: &str, data: Vec<Document>) -> Result<Vec<Document>> {
        self.inner.insert_many(collection, data).await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Value,
        patch: &Value,
        projection: Option<&str>,
    ) -> Result<Option<Document>> {
        self.inner
            .find_one_and_update(collection, filter, patch, projection)
            .await
    }

    async fn delete_one(&self, collection: &str, filter: &Value) -> Result<u64> {
        self.inner.delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &Value) -> Result<u64> {
        self.inner.delete_many(collection, filter).await
    }
}

#[tokio::test]
async fn create_with_empty_check_skips_the_lookup() {
    let store = CountingStore::new();
    let model = ModelHandle::new("users");

    let response = crud::create(&store, &model, json!({"name": "ada"}), Map::new())
        .await
        .unwrap();

    assert!(response.success);
    // One reload happens after the insert; the guard itself never looked.
    assert_eq!(store.lookups(), 1);
}

#[tokio::test]
async fn create_with_colliding_check_raises_conflict_and_inserts_nothing() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("users");
    crud::create(&store, &model, json!({"name": "john"}), Map::new())
        .await
        .unwrap();

    let err = crud::create(
        &store,
        &model,
        json!({"name": "john", "age": 31}),
        obj(json!({"name": "john"})),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CrudError::Conflict(_)));
    assert!(err.to_string().contains("name"));
    assert_eq!(store.count("users"), 1);
}

#[tokio::test]
async fn conflict_names_fields_not_values() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("users");
    crud::create(&store, &model, json!({"name": "john", "age": 30}), Map::new())
        .await
        .unwrap();

    let err = crud::create(
        &store,
        &model,
        json!({"name": "john", "age": 30}),
        obj(json!({"name": "john", "age": 30})),
    )
    .await
    .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("age, name") || message.contains("name, age"));
    assert!(!message.contains("john"));
}

#[tokio::test]
async fn create_many_is_all_or_nothing_on_collision() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("users");
    crud::create(&store, &model, json!({"name": "b"}), Map::new())
        .await
        .unwrap();

    let err = crud::create_many(
        &store,
        &model,
        vec![json!({"name": "a"}), json!({"name": "b2"}), json!({"name": "c"})],
        vec![
            obj(json!({"name": "a"})),
            obj(json!({"name": "b"})),
            obj(json!({"name": "c"})),
        ],
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CrudError::Conflict(_)));
    // No partial batch commit: only the pre-existing document remains.
    assert_eq!(store.count("users"), 1);
}

#[tokio::test]
async fn create_many_preserves_input_order() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("users");

    let response = crud::create_many(
        &store,
        &model,
        vec![
            json!({"name": "first"}),
            json!({"name": "second"}),
            json!({"name": "third"}),
        ],
        vec![],
    )
    .await
    .unwrap();

    let names: Vec<&str> = response
        .data
        .iter()
        .map(|doc| doc["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["first", "second", "third"]);
}

#[tokio::test]
async fn create_reloads_with_projection_applied() {
    let store = MemoryStore::new();
    let model = ModelHandle::with_exempt("users", &["-age"]);

    let response = crud::create(
        &store,
        &model,
        json!({"name": "john", "age": 30}),
        obj(json!({"name": "john"})),
    )
    .await
    .unwrap();

    assert!(response.success);
    assert_eq!(response.message, "Successfully created");
    assert_eq!(response.data["name"], json!("john"));
    assert!(response.data.get("age").is_none());
    assert!(response.doc_length.is_none());
}

#[tokio::test]
async fn get_many_paginates_sorts_and_projects() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("people");
    for age in 1..=12 {
        crud::create(
            &store,
            &model,
            json!({"name": format!("doc{}", age), "age": age}),
            Map::new(),
        )
        .await
        .unwrap();
    }

    let response = crud::get_many(
        &store,
        &model,
        obj(json!({"page": "2", "limit": "5", "sort": "-age", "fields": "name"})),
        None,
        None,
    )
    .await
    .unwrap();

    assert!(response.success);
    assert_eq!(response.doc_length, Some(1));
    let names: Vec<&str> = response
        .data
        .iter()
        .map(|doc| doc["name"].as_str().unwrap())
        .collect();
    // Page 2 of 12 documents in descending-age order: ages 7 down to 3.
    assert_eq!(names, ["doc7", "doc6", "doc5", "doc4", "doc3"]);
    for doc in &response.data {
        assert_eq!(doc.as_object().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn get_many_translates_operator_suffixes() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("people");
    for age in [3, 10, 25] {
        crud::create(&store, &model, json!({"name": "p", "age": age}), Map::new())
            .await
            .unwrap();
    }

    let response = crud::get_many(
        &store,
        &model,
        obj(json!({"age_gte": "10"})),
        None,
        None,
    )
    .await
    .unwrap();
    assert_eq!(response.data.len(), 2);
}

#[tokio::test]
async fn get_many_applies_category_filter() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("people");
    crud::create(&store, &model, json!({"name": "a", "role": "admin"}), Map::new())
        .await
        .unwrap();
    crud::create(&store, &model, json!({"name": "b", "role": "user"}), Map::new())
        .await
        .unwrap();

    let response = crud::get_many(
        &store,
        &model,
        Map::new(),
        None,
        Some(obj(json!({"role": "admin"}))),
    )
    .await
    .unwrap();
    assert_eq!(response.data.len(), 1);
    assert_eq!(response.data[0]["name"], json!("a"));
}

#[tokio::test]
async fn get_one_returns_the_document_or_not_found() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("users");
    crud::create(&store, &model, json!({"name": "ada", "age": 36}), Map::new())
        .await
        .unwrap();

    let response = crud::get_one(&store, &model, obj(json!({"name": "ada"})), None)
        .await
        .unwrap();
    assert_eq!(response.data["age"], json!(36));

    // A genuinely missing document raises NotFound; the resolved
    // document is checked, not the pending handle.
    let err = crud::get_one(&store, &model, obj(json!({"name": "ghost"})), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::NotFound(_)));
}

#[tokio::test]
async fn get_one_expands_references() {
    let store = MemoryStore::new();
    store.register_reference("posts", "author", "users");
    let users = ModelHandle::new("users");
    let posts = ModelHandle::new("posts");

    let author = crud::create(&store, &users, json!({"name": "ada", "age": 36}), Map::new())
        .await
        .unwrap();
    crud::create(
        &store,
        &posts,
        json!({"title": "hello", "author": author.data["_id"].clone()}),
        Map::new(),
    )
    .await
    .unwrap();

    let populate = PopulateArg::One(PopulateField::path("author").with_fields(vec!["name"]));
    let response = crud::get_one(&store, &posts, obj(json!({"title": "hello"})), Some(populate))
        .await
        .unwrap();
    assert_eq!(response.data["author"], json!({"name": "ada"}));
}

#[tokio::test]
async fn update_patches_the_matching_document() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("users");
    crud::create(&store, &model, json!({"name": "ada", "age": 36}), Map::new())
        .await
        .unwrap();

    let response = crud::update(
        &store,
        &model,
        &json!({"name": "ada"}),
        &json!({"age": 37}),
    )
    .await
    .unwrap();
    assert_eq!(response.message, "Successfully updated");
    assert_eq!(response.data["age"], json!(37));

    let err = crud::update(
        &store,
        &model,
        &json!({"name": "ghost"}),
        &json!({"age": 1}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CrudError::NotUpdated(_)));
}

#[tokio::test]
async fn delete_succeeds_even_when_nothing_matches() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("users");

    // Matching zero documents is indistinguishable from a successful
    // removal; only a store failure surfaces as an error.
    let response = crud::delete(&store, &model, &json!({"name": "nobody"}))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.data, "deleted");
}

#[tokio::test]
async fn delete_many_removes_every_match() {
    let store = MemoryStore::new();
    let model = ModelHandle::new("users");
    for name in ["a", "b", "c"] {
        crud::create(&store, &model, json!({"name": name, "tier": "trial"}), Map::new())
            .await
            .unwrap();
    }

    let response = crud::delete_many(&store, &model, &json!({"tier": "trial"}))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(store.count("users"), 0);
}

#[tokio::test]
async fn unique_index_backstops_the_guard() {
    let store = MemoryStore::new();
    store.create_unique_index("users", "email");
    let model = ModelHandle::new("users");

    crud::create(&store, &model, json!({"email": "ada@example.com"}), Map::new())
        .await
        .unwrap();

    // An empty check skips the guard, so only the store-level index
    // rejects the duplicate.
    let err = crud::create(&store, &model, json!({"email": "ada@example.com"}), Map::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("E11000"));
}
