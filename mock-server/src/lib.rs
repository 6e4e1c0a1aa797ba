use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Bearer token accepted by `/protected`.
pub const VALID_TOKEN: &str = "secret-token";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

#[derive(Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub dimensions: Option<Dimensions>,
}

#[derive(Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub dimensions: Option<Dimensions>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub request_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub fields: BTreeMap<String, String>,
    pub files: Vec<UploadedFile>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item).put(update_item).delete(delete_item))
        .route("/status/{code}", get(status))
        .route("/protected", get(protected))
        .route("/upload", post(upload).put(upload))
        .route("/headers", get(echo_headers))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let items = db.read().await;
    Json(items.values().cloned().collect())
}

async fn create_item(State(db): State<Db>, Json(input): Json<NewItem>) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        name: input.name,
        tags: input.tags,
        dimensions: input.dimensions,
    };
    db.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn get_item(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Item>, StatusCode> {
    let items = db.read().await;
    items.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ItemPatch>,
) -> Result<Json<Item>, StatusCode> {
    let mut items = db.write().await;
    let item = items.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = patch.name {
        item.name = name;
    }
    if let Some(tags) = patch.tags {
        item.tags = tags;
    }
    if let Some(dimensions) = patch.dimensions {
        item.dimensions = Some(dimensions);
    }
    Ok(Json(item.clone()))
}

async fn delete_item(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, StatusCode> {
    let mut items = db.write().await;
    items.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

/// Answer with `code`, echoing `request_id` in `x-request-id` when given.
async fn status(Path(code): Path<u16>, Query(query): Query<StatusQuery>) -> Response {
    let Ok(status) = StatusCode::from_u16(code) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let mut response = (status, Json(serde_json::json!({ "status": code }))).into_response();
    if let Some(value) = query
        .request_id
        .and_then(|id| HeaderValue::from_str(&id).ok())
    {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

async fn protected(headers: HeaderMap) -> Result<Json<serde_json::Value>, StatusCode> {
    let expected = format!("Bearer {VALID_TOKEN}");
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(Json(serde_json::json!({ "authorized": true }))),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn upload(mut multipart: Multipart) -> Result<Json<UploadSummary>, StatusCode> {
    let mut summary = UploadSummary::default();
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                summary.files.push(UploadedFile {
                    field: name,
                    filename,
                    content_type,
                    size: bytes.len(),
                    text: String::from_utf8(bytes.to_vec()).ok(),
                });
            }
            None => {
                let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                summary.fields.insert(name, value);
            }
        }
    }
    Ok(Json(summary))
}

async fn echo_headers(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    Json(
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_serializes_without_missing_dimensions() {
        let item = Item {
            id: Uuid::nil(),
            name: "Bolt".to_string(),
            tags: vec![],
            dimensions: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["name"], "Bolt");
        assert!(json.get("dimensions").is_none());
    }

    #[test]
    fn item_roundtrips_with_nested_optionals() {
        let item = Item {
            id: Uuid::new_v4(),
            name: "Crate".to_string(),
            tags: vec!["wood".to_string()],
            dimensions: Some(Dimensions {
                width: 2,
                height: 3,
                depth: None,
            }),
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn new_item_defaults_tags() {
        let input: NewItem = serde_json::from_str(r#"{"name":"Nut"}"#).unwrap();
        assert_eq!(input.name, "Nut");
        assert!(input.tags.is_empty());
        assert!(input.dimensions.is_none());
    }

    #[test]
    fn new_item_rejects_missing_name() {
        let result: Result<NewItem, _> = serde_json::from_str(r#"{"tags":["x"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn item_patch_all_fields_optional() {
        let patch: ItemPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.name.is_none());
        assert!(patch.tags.is_none());
        assert!(patch.dimensions.is_none());
    }
}
