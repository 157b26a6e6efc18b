// handler/uploads.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, MethodRouter},
    Extension, Json, Router,
};
use chrono::Utc;

use crate::{
    error::{ErrorMessage, HttpError},
    middleware::{auth, JWTAuthMiddeware},
    models::uploadmodel::{UploadCredentialResponse, UploadNamespace},
    service::media_signature::MediaSigner,
    AppState,
};

/// Signature endpoints for every namespace except properties, which mounts
/// its own under `/properties`.
pub fn upload_signature_handler() -> Router {
    UploadNamespace::ALL
        .iter()
        .filter(|namespace| **namespace != UploadNamespace::Property)
        .fold(Router::new(), |router, namespace| {
            router.route(
                &format!("/{}/cloudinary-signature", namespace.route_segment()),
                signature_route(*namespace),
            )
        })
}

/// `GET` route issuing credentials for one namespace, behind `auth`.
pub fn signature_route(namespace: UploadNamespace) -> MethodRouter {
    get(
        move |Extension(app_state): Extension<Arc<AppState>>,
              Extension(user): Extension<JWTAuthMiddeware>| async move {
            tracing::debug!(
                "Upload credential requested by {} for {}",
                user.user.id,
                namespace.route_segment()
            );
            cloudinary_signature(&app_state, namespace)
        },
    )
    .layer(middleware::from_fn(auth))
}

pub fn cloudinary_signature(
    app_state: &AppState,
    namespace: UploadNamespace,
) -> Result<Json<UploadCredentialResponse>, HttpError> {
    let signer = MediaSigner::from_config(&app_state.env.cloudinary).ok_or_else(|| {
        tracing::error!("Upload credential requested but media host credentials are not set");
        HttpError::server_error(ErrorMessage::MediaUploadsNotConfigured.to_string())
    })?;

    Ok(Json(UploadCredentialResponse {
        status: "success".to_string(),
        data: signer.sign(namespace, Utc::now().timestamp()),
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{test_config, test_state};

    #[tokio::test]
    async fn test_signature_requires_authentication() {
        let app = upload_signature_handler().layer(Extension(test_state(test_config())));

        for path in ["/agents", "/agencies", "/promoters", "/verifications"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("{}/cloudinary-signature", path))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", path);
        }
    }

    #[tokio::test]
    async fn test_signature_without_media_credentials() {
        let mut config = test_config();
        config.cloudinary = Default::default();
        let state = test_state(config);

        let err = cloudinary_signature(&state, UploadNamespace::Agent).unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, ErrorMessage::MediaUploadsNotConfigured.to_string());
    }

    #[tokio::test]
    async fn test_signature_issues_credential() {
        let state = test_state(test_config());

        let Json(response) = cloudinary_signature(&state, UploadNamespace::Promoter).unwrap();
        let credential = response.data;
        assert_eq!(response.status, "success");
        assert_eq!(credential.cloud_name, "demo");
        assert_eq!(credential.api_key, "1234");
        assert_eq!(credential.signature.len(), 64);
        assert!((Utc::now().timestamp() - credential.timestamp).abs() < 5);
    }
}
