// client/upload.rs
use futures::future::join_all;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dtos::propertydtos::ListingDto,
    models::uploadmodel::{UploadCredential, UploadCredentialResponse, UploadNamespace},
};

use super::{error::ClientError, ApiClient, AuthContext};

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadFile {
            file_name: file_name.into(),
            mime_type: None,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UploadedImage {
    pub url: String,
    #[serde(rename = "publicId")]
    pub public_id: String,
}

#[derive(Debug, Deserialize)]
struct MediaHostUpload {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct ListingEnvelope {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    property: ListingDto,
}

impl ApiClient {
    pub async fn fetch_upload_credential(
        &self,
        namespace: UploadNamespace,
        auth: &AuthContext,
    ) -> Result<UploadCredential, ClientError> {
        let token = auth.bearer()?;

        let response = self
            .http()
            .get(self.api_url(&namespace.signature_path()))
            .bearer_auth(token)
            .send()
            .await?;

        let body: UploadCredentialResponse = ApiClient::read_json(response).await?;
        Ok(body.data)
    }

    /// Signs, then uploads one file straight to the media host.
    pub async fn upload_image(
        &self,
        namespace: UploadNamespace,
        file: &UploadFile,
        auth: &AuthContext,
    ) -> Result<UploadedImage, ClientError> {
        let credential = self.fetch_upload_credential(namespace, auth).await?;

        let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        if let Some(mime_type) = &file.mime_type {
            part = part.mime_str(mime_type)?;
        }

        let mut form = Form::new()
            .part("file", part)
            .text("timestamp", credential.timestamp.to_string())
            .text("signature", credential.signature)
            .text("api_key", credential.api_key)
            .text("folder", namespace.default_folder());
        if let Some(preset) = &self.config().upload_preset {
            form = form.text("upload_preset", preset.clone());
        }

        let url = format!(
            "{}/v1_1/{}/image/upload",
            self.config().media_host_url,
            credential.cloud_name
        );

        let response = self.http().post(url).multipart(form).send().await?;
        let uploaded: MediaHostUpload = ApiClient::read_json(response).await?;

        tracing::debug!("Uploaded {} as {}", file.file_name, uploaded.public_id);

        Ok(UploadedImage {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    /// Uploads every file concurrently and waits for all of them. The batch
    /// fails with the first failure in input order.
    pub async fn upload_images(
        &self,
        namespace: UploadNamespace,
        files: &[UploadFile],
        auth: &AuthContext,
    ) -> Result<Vec<UploadedImage>, ClientError> {
        auth.bearer()?;

        let results = join_all(
            files
                .iter()
                .map(|file| self.upload_image(namespace, file, auth)),
        )
        .await;

        let failed = results.iter().filter(|result| result.is_err()).count();
        if failed > 0 {
            tracing::warn!("{} of {} uploads failed", failed, files.len());
        }

        results.into_iter().collect()
    }

    /// Attaches uploaded images to a listing.
    pub async fn associate_images(
        &self,
        listing_id: Uuid,
        images: &[UploadedImage],
        auth: &AuthContext,
    ) -> Result<ListingDto, ClientError> {
        let token = auth.bearer()?;

        let response = self
            .http()
            .post(self.api_url(&format!("/api/properties/{}/images", listing_id)))
            .bearer_auth(token)
            .json(&serde_json::json!({ "cloudinaryUrls": images }))
            .send()
            .await?;

        let body: ListingEnvelope = ApiClient::read_json(response).await?;
        Ok(body.data.property)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use axum::{
        body::Bytes,
        extract::Path,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use chrono::{Duration, Utc};

    use super::*;
    use crate::{
        client::test_support::{client_for, spawn_server},
        models::propertymodel::{fixtures::listing, ListingImage, ListingStatus},
    };

    #[derive(Default)]
    struct Counters {
        signatures: AtomicUsize,
        uploads: AtomicUsize,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            == Some("Bearer good-token")
    }

    /// Signature endpoint plus a media host that rejects any file whose
    /// bytes contain `corrupt`.
    fn media_server(counters: Arc<Counters>) -> Router {
        let sig_counters = counters.clone();
        let upload_counters = counters;

        Router::new()
            .route(
                "/api/:segment/cloudinary-signature",
                get(move |headers: HeaderMap| {
                    let counters = sig_counters.clone();
                    async move {
                        counters.signatures.fetch_add(1, Ordering::SeqCst);
                        if !authorized(&headers) {
                            return (
                                StatusCode::UNAUTHORIZED,
                                Json(serde_json::json!({ "status": "fail", "message": "You are not logged in, please provide a token" })),
                            )
                                .into_response();
                        }
                        Json(serde_json::json!({
                            "status": "success",
                            "data": {
                                "timestamp": 1_700_000_000,
                                "signature": "abc123",
                                "cloudName": "demo",
                                "apiKey": "1234"
                            }
                        }))
                        .into_response()
                    }
                }),
            )
            .route(
                "/v1_1/:cloud/image/upload",
                post(move |Path(cloud): Path<String>, body: Bytes| {
                    let counters = upload_counters.clone();
                    async move {
                        let n = counters.uploads.fetch_add(1, Ordering::SeqCst);
                        let body = String::from_utf8_lossy(&body).to_string();
                        if body.contains("corrupt") {
                            return (
                                StatusCode::BAD_REQUEST,
                                Json(serde_json::json!({ "error": { "message": "Invalid image file" } })),
                            )
                                .into_response();
                        }
                        assert_eq!(cloud, "demo");
                        assert!(body.contains("abc123"));
                        assert!(body.contains("estatehub_signed"));
                        let folder = if body.contains("estatehub/agents") { "estatehub/agents" } else { "estatehub/properties" };
                        Json(serde_json::json!({
                            "secure_url": format!("https://res.cloudinary.com/demo/image/upload/{}/{}.jpg", folder, n),
                            "public_id": format!("{}/{}", folder, n)
                        }))
                        .into_response()
                    }
                }),
            )
    }

    #[tokio::test]
    async fn test_missing_token_makes_no_network_call() {
        let counters = Arc::new(Counters::default());
        let base = spawn_server(media_server(counters.clone())).await;
        let client = client_for(&base, &base);
        let anonymous = AuthContext::anonymous();

        let err = client
            .fetch_upload_credential(UploadNamespace::Property, &anonymous)
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::AuthenticationRequired);

        let files = vec![UploadFile::new("a.jpg", b"a".to_vec())];
        let err = client
            .upload_images(UploadNamespace::Property, &files, &anonymous)
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::AuthenticationRequired);

        let err = client
            .associate_images(Uuid::new_v4(), &[], &anonymous)
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::AuthenticationRequired);

        assert_eq!(counters.signatures.load(Ordering::SeqCst), 0);
        assert_eq!(counters.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_image_uses_namespace_folder() {
        let counters = Arc::new(Counters::default());
        let base = spawn_server(media_server(counters.clone())).await;
        let client = client_for(&base, &base);

        let file = UploadFile::new("agent.jpg", b"portrait".to_vec()).with_mime_type("image/jpeg");
        let uploaded = client
            .upload_image(UploadNamespace::Agent, &file, &AuthContext::with_token("good-token"))
            .await
            .unwrap();

        assert!(uploaded.public_id.starts_with("estatehub/agents/"));
        assert!(uploaded.url.starts_with("https://res.cloudinary.com/demo/"));
        assert_eq!(counters.signatures.load(Ordering::SeqCst), 1);
        assert_eq!(counters.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_signature_carries_server_message() {
        let counters = Arc::new(Counters::default());
        let base = spawn_server(media_server(counters.clone())).await;
        let client = client_for(&base, &base);

        let file = UploadFile::new("a.jpg", b"a".to_vec());
        let err = client
            .upload_image(UploadNamespace::Property, &file, &AuthContext::with_token("stale-token"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClientError::upstream(Some(401), "You are not logged in, please provide a token")
        );
        assert_eq!(counters.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_fails_with_second_error_after_issuing_all() {
        let counters = Arc::new(Counters::default());
        let base = spawn_server(media_server(counters.clone())).await;
        let client = client_for(&base, &base);

        let files = vec![
            UploadFile::new("one.jpg", b"first".to_vec()),
            UploadFile::new("two.jpg", b"corrupt".to_vec()),
            UploadFile::new("three.jpg", b"third".to_vec()),
        ];
        let err = client
            .upload_images(UploadNamespace::Property, &files, &AuthContext::with_token("good-token"))
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::upstream(Some(400), "Invalid image file"));
        assert_eq!(counters.signatures.load(Ordering::SeqCst), 3);
        assert_eq!(counters.uploads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_batch_success_keeps_input_order() {
        let counters = Arc::new(Counters::default());
        let base = spawn_server(media_server(counters)).await;
        let client = client_for(&base, &base);

        let files: Vec<_> = (0..3)
            .map(|i| UploadFile::new(format!("{}.jpg", i), vec![b'x'; i + 1]))
            .collect();
        let uploaded = client
            .upload_images(UploadNamespace::Property, &files, &AuthContext::with_token("good-token"))
            .await
            .unwrap();

        assert_eq!(uploaded.len(), 3);
        assert!(uploaded.iter().all(|image| image.public_id.starts_with("estatehub/properties/")));
    }

    #[tokio::test]
    async fn test_associate_images_posts_url_pairs() {
        let app = Router::new().route(
            "/api/properties/:id/images",
            post(|Path(id): Path<Uuid>, headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert!(authorized(&headers));
                let urls = body["cloudinaryUrls"].as_array().unwrap();
                assert_eq!(urls[0]["publicId"], "estatehub/properties/0");

                let mut item = listing(ListingStatus::Active, Utc::now() + Duration::days(10));
                item.id = id;
                item.images.0.push(ListingImage {
                    url: urls[0]["url"].as_str().unwrap().to_string(),
                    public_id: Some("estatehub/properties/0".to_string()),
                    is_main: true,
                });
                Json(serde_json::json!({
                    "status": "success",
                    "data": { "property": ListingDto::from_listing(&item, Utc::now()) }
                }))
            }),
        );
        let base = spawn_server(app).await;
        let client = client_for(&base, &base);

        let listing_id = Uuid::new_v4();
        let images = vec![UploadedImage {
            url: "https://res.cloudinary.com/demo/image/upload/estatehub/properties/0.jpg".to_string(),
            public_id: "estatehub/properties/0".to_string(),
        }];
        let updated = client
            .associate_images(listing_id, &images, &AuthContext::with_token("good-token"))
            .await
            .unwrap();

        assert_eq!(updated.id, listing_id);
        assert_eq!(updated.main_image.as_deref(), Some(images[0].url.as_str()));
    }
}
