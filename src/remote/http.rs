//! HTTP backend
//!
//! JSON-over-HTTP collaborators for the hosted backend, authenticated with
//! the session's bearer token.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Result, SyncError};
use crate::models::{ImageUpload, NewPet, Pet, PetPatch};
use crate::remote::{ImageStore, RemoteCollection};
use crate::session::Session;

/// Shape of error bodies returned by the backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Maps a non-success response onto the error taxonomy.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        });

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Authentication(message),
        StatusCode::NOT_FOUND => SyncError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            SyncError::Validation(message)
        }
        _ => SyncError::Network(format!("unexpected status {}: {}", status, message)),
    })
}

async fn json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = check(request.send().await?).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| SyncError::Network(format!("invalid response body: {}", e)))
}

/// Shared plumbing for both collaborators.
#[derive(Debug, Clone)]
struct Endpoint {
    client: Client,
    base_url: String,
    session: Session,
}

impl Endpoint {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Builds an authenticated request; fails fast without a token.
    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self
            .session
            .token()
            .ok_or_else(|| SyncError::Authentication("no auth token".to_string()))?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }
}

// == HTTP Pet API ==
/// Pet collection served by the REST backend.
#[derive(Debug, Clone)]
pub struct HttpPetApi {
    endpoint: Endpoint,
}

impl HttpPetApi {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        Self::with_client(Client::new(), base_url, session)
    }

    /// Uses a preconfigured client (proxies, TLS, pooling).
    pub fn with_client(client: Client, base_url: impl Into<String>, session: Session) -> Self {
        Self {
            endpoint: Endpoint {
                client,
                base_url: base_url.into(),
                session,
            },
        }
    }

    fn pet_url(&self, id: &str) -> String {
        self.endpoint.url(&format!("pets/{}", id))
    }
}

#[async_trait]
impl RemoteCollection for HttpPetApi {
    type Item = Pet;
    type Input = NewPet;
    type Patch = PetPatch;

    async fn list(&self, owner_id: &str) -> Result<Vec<Pet>> {
        let request = self
            .endpoint
            .request(Method::GET, &self.endpoint.url("pets"))?
            .query(&[("owner_id", owner_id)]);
        json(request).await
    }

    async fn fetch(&self, id: &str) -> Result<Pet> {
        json(self.endpoint.request(Method::GET, &self.pet_url(id))?).await
    }

    async fn create(&self, input: &NewPet) -> Result<Pet> {
        let request = self
            .endpoint
            .request(Method::POST, &self.endpoint.url("pets"))?
            .json(input);
        json(request).await
    }

    async fn update(&self, id: &str, patch: &PetPatch) -> Result<Pet> {
        let request = self
            .endpoint
            .request(Method::PATCH, &self.pet_url(id))?
            .json(patch);
        json(request).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let request = self.endpoint.request(Method::DELETE, &self.pet_url(id))?;
        check(request.send().await?).await?;
        Ok(())
    }
}

// == HTTP Image Store ==
#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Image storage endpoint of the REST backend.
#[derive(Debug, Clone)]
pub struct HttpImageStore {
    endpoint: Endpoint,
}

impl HttpImageStore {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        Self::with_client(Client::new(), base_url, session)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, session: Session) -> Self {
        Self {
            endpoint: Endpoint {
                client,
                base_url: base_url.into(),
                session,
            },
        }
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    async fn upload(&self, image: &ImageUpload) -> Result<String> {
        let request = self
            .endpoint
            .request(Method::POST, &self.endpoint.url("images"))?
            .query(&[("file_name", image.file_name.as_str())])
            .header(CONTENT_TYPE, image.content_type.as_str())
            .body(image.bytes.clone());
        let uploaded: UploadResponse = json(request).await?;
        Ok(uploaded.url)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let request = self.endpoint.request(Method::DELETE, url)?;
        check(request.send().await?).await?;
        Ok(())
    }
}
