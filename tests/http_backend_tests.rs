//! Integration Tests for the HTTP Backend
//!
//! Runs the reqwest clients against a small axum server on a local port
//! that mimics the REST backend, including its error bodies.

use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, HOST},
        HeaderMap, StatusCode,
    },
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use petsync::cache::SharedCache;
use petsync::config::CachePolicy;
use petsync::models::{ImageUpload, NewPet, Pet, PetPatch, Species};
use petsync::remote::{DynPetApi, HttpImageStore, HttpPetApi, ImageStore, InMemoryPetApi, RemoteCollection};
use petsync::repository::{PetRepository, RepositoryContext};
use petsync::{Session, SyncError};
use tokio_test::{assert_err, assert_ok};

// == Fake Backend ==

#[derive(Clone, Default)]
struct Backend {
    pets: Arc<Mutex<Vec<Pet>>>,
    images: Arc<Mutex<Vec<String>>>,
}

type ApiError = (StatusCode, Json<Value>);

fn error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

fn authorize(headers: &HeaderMap) -> Result<(), ApiError> {
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some("Bearer secret") => Ok(()),
        _ => Err(error(StatusCode::UNAUTHORIZED, "invalid token")),
    }
}

#[derive(Deserialize)]
struct OwnerQuery {
    owner_id: String,
}

#[derive(Deserialize)]
struct FileQuery {
    file_name: String,
}

async fn list_pets(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Pet>>, ApiError> {
    authorize(&headers)?;
    if query.owner_id == "boom" {
        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable"));
    }
    let pets = backend
        .pets
        .lock()
        .unwrap()
        .iter()
        .filter(|pet| pet.owner_id == query.owner_id)
        .cloned()
        .collect();
    Ok(Json(pets))
}

async fn fetch_pet(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Pet>, ApiError> {
    authorize(&headers)?;
    let pet = backend
        .pets
        .lock()
        .unwrap()
        .iter()
        .find(|pet| pet.id == id)
        .cloned();
    pet.map(Json)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "pet not found"))
}

async fn create_pet(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(input): Json<NewPet>,
) -> Result<(StatusCode, Json<Pet>), ApiError> {
    authorize(&headers)?;
    if input.name.trim().is_empty() {
        return Err(error(StatusCode::UNPROCESSABLE_ENTITY, "name must not be empty"));
    }
    let mut pets = backend.pets.lock().unwrap();
    let id = format!("srv-{}", pets.len() + 1);
    let mut pet = InMemoryPetApi::pet(&input.owner_id, &id, &input.name);
    pet.species = input.species;
    pet.image_url = input.image_url;
    pets.push(pet.clone());
    Ok((StatusCode::CREATED, Json(pet)))
}

async fn update_pet(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<PetPatch>,
) -> Result<Json<Pet>, ApiError> {
    authorize(&headers)?;
    let mut pets = backend.pets.lock().unwrap();
    let pet = pets
        .iter_mut()
        .find(|pet| pet.id == id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "pet not found"))?;
    patch.apply_to(pet);
    Ok(Json(pet.clone()))
}

async fn delete_pet(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    authorize(&headers)?;
    let mut pets = backend.pets.lock().unwrap();
    let before = pets.len();
    pets.retain(|pet| pet.id != id);
    if pets.len() == before {
        return Err(error(StatusCode::NOT_FOUND, "pet not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_image(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    authorize(&headers)?;
    if headers.get(CONTENT_TYPE).is_none() || body.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "empty image"));
    }
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
        .to_string();
    let mut images = backend.images.lock().unwrap();
    let name = format!("{}-{}", images.len() + 1, query.file_name);
    images.push(name.clone());
    Ok(Json(json!({ "url": format!("http://{}/images/{}", host, name) })))
}

async fn delete_image(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    authorize(&headers)?;
    let mut images = backend.images.lock().unwrap();
    let before = images.len();
    images.retain(|image| *image != name);
    if images.len() == before {
        return Err(error(StatusCode::NOT_FOUND, "image not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn router(backend: Backend) -> Router {
    Router::new()
        .route("/pets", get(list_pets).post(create_pet))
        .route(
            "/pets/:id",
            get(fetch_pet).patch(update_pet).delete(delete_pet),
        )
        .route("/images", post(upload_image))
        .route("/images/:name", delete(delete_image))
        .with_state(backend)
}

/// Starts the fake backend and returns its base URL.
async fn spawn_backend(backend: Backend) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(backend)).await.unwrap();
    });
    format!("http://{}", addr)
}

// == Helper Functions ==

async fn setup(pets: Vec<Pet>) -> (Backend, String, Session) {
    let backend = Backend::default();
    *backend.pets.lock().unwrap() = pets;
    let url = spawn_backend(backend.clone()).await;
    (backend, url, Session::signed_in("u1", "secret"))
}

fn repository(url: &str, session: &Session) -> PetRepository {
    let api: Arc<DynPetApi> = Arc::new(HttpPetApi::new(url, session.clone()));
    let images: Arc<dyn ImageStore> = Arc::new(HttpImageStore::new(url, session.clone()));
    let ctx = RepositoryContext::new(SharedCache::new(100), session.clone(), CachePolicy::default());
    PetRepository::new("pets", api, ctx).with_images(images)
}

// == Pet API ==

#[tokio::test]
async fn test_list_and_fetch() {
    let (_, url, session) = setup(vec![
        InMemoryPetApi::pet("u1", "p1", "Max"),
        InMemoryPetApi::pet("u2", "p2", "Luna"),
    ])
    .await;
    let api = HttpPetApi::new(&url, session);

    let pets = assert_ok!(api.list("u1").await);
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].name, "Max");

    let pet = assert_ok!(api.fetch("p2").await);
    assert_eq!(pet.owner_id, "u2");
}

#[tokio::test]
async fn test_status_codes_map_to_error_kinds() {
    let (_, url, session) = setup(vec![]).await;
    let api = HttpPetApi::new(&url, session.clone());

    let err = assert_err!(api.fetch("missing").await);
    assert_eq!(err, SyncError::NotFound("pet not found".to_string()));

    let err = assert_err!(api.create(&NewPet::new("u1", "", Species::Dog)).await);
    assert_eq!(err, SyncError::Validation("name must not be empty".to_string()));

    let err = assert_err!(api.list("boom").await);
    assert!(matches!(err, SyncError::Network(_)));
    assert!(err.is_retryable());

    session.login("u1", "wrong");
    let err = assert_err!(api.list("u1").await);
    assert_eq!(err, SyncError::Authentication("invalid token".to_string()));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let api = HttpPetApi::new(url, Session::signed_in("u1", "secret"));

    let err = assert_err!(api.list("u1").await);

    assert!(matches!(err, SyncError::Network(_) | SyncError::Timeout(_)));
}

#[tokio::test]
async fn test_create_update_delete() {
    let (backend, url, session) = setup(vec![]).await;
    let api = HttpPetApi::new(&url, session);

    let created = assert_ok!(api.create(&NewPet::new("u1", "Luna", Species::Cat)).await);
    assert_eq!(created.species, Species::Cat);

    let updated = assert_ok!(api.update(&created.id, &PetPatch::name("Luna II")).await);
    assert_eq!(updated.name, "Luna II");
    assert_eq!(backend.pets.lock().unwrap()[0].name, "Luna II");

    assert_ok!(api.delete(&created.id).await);
    assert!(backend.pets.lock().unwrap().is_empty());

    let err = assert_err!(api.delete(&created.id).await);
    assert!(matches!(err, SyncError::NotFound(_)));
}

// == Image Store ==

#[tokio::test]
async fn test_image_upload_and_delete() {
    let (backend, url, session) = setup(vec![]).await;
    let store = HttpImageStore::new(&url, session);

    let image_url = assert_ok!(store.upload(&ImageUpload::jpeg("max.jpg", vec![0xFF, 0xD8])).await);
    assert!(image_url.ends_with("/images/1-max.jpg"));
    assert_eq!(backend.images.lock().unwrap().len(), 1);

    assert_ok!(store.delete(&image_url).await);
    assert!(backend.images.lock().unwrap().is_empty());
}

// == Repository over HTTP ==

#[tokio::test]
async fn test_repository_round_trip_over_http() {
    let (backend, url, session) = setup(vec![InMemoryPetApi::pet("u1", "p1", "Max")]).await;
    let repo = repository(&url, &session);

    assert_ok!(repo.load_async(false).await);
    assert_eq!(repo.items().len(), 1);

    let luna = assert_ok!(
        repo.create_with_image(
            NewPet::new("u1", "Luna", Species::Cat),
            ImageUpload::jpeg("luna.jpg", vec![0xFF, 0xD8]),
        )
        .await
    );
    assert!(luna.image_url.is_some());
    assert_eq!(repo.items().len(), 2);

    assert_ok!(repo.delete(&luna.id).await);
    assert_eq!(repo.items().len(), 1);
    assert!(backend.images.lock().unwrap().is_empty(), "owned image deleted");
}

#[tokio::test]
async fn test_rejected_token_loads_as_empty() {
    let (_, url, _) = setup(vec![InMemoryPetApi::pet("u1", "p1", "Max")]).await;
    let session = Session::signed_in("u1", "expired");
    let repo = repository(&url, &session);

    let items = assert_ok!(repo.load_async(false).await);

    assert!(items.is_empty());
    assert!(repo.state().last_error.is_none());
}
