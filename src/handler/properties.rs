use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::propertydb::PropertyExt,
    dtos::{
        propertydtos::{
            validate_coordinates, AssociateImagesDto, CreateListingDto, ListingDto, SearchQueryDto,
            UpdateListingDto,
        },
        userdtos::Response,
    },
    error::{ErrorMessage, HttpError},
    handler::uploads::signature_route,
    middleware::{auth, JWTAuthMiddeware},
    models::{
        propertymodel::{Listing, ListingCategory},
        uploadmodel::UploadNamespace,
        usermodel::UserRole,
    },
    AppState,
};

pub fn property_handler() -> Router {
    Router::new()
        .route(
            "/",
            post(create_listing).layer(middleware::from_fn(auth)),
        )
        .route("/search", get(search_listings))
        .route("/category/:slug", get(get_listings_by_category))
        .route("/cloudinary-signature", signature_route(UploadNamespace::Property))
        .route(
            "/:property_id",
            get(get_listing_by_id).merge(
                put(update_listing)
                    .delete(delete_listing)
                    .layer(middleware::from_fn(auth)),
            ),
        )
        .route(
            "/:property_id/images",
            post(associate_images).layer(middleware::from_fn(auth)),
        )
}

/// Owner of the listing or an admin.
fn ensure_can_manage(listing: &Listing, user: &JWTAuthMiddeware) -> Result<(), HttpError> {
    if listing.owner_id == user.user.id || user.user.role == UserRole::Admin {
        Ok(())
    } else {
        Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()))
    }
}

async fn load_listing(app_state: &AppState, property_id: Uuid) -> Result<Listing, HttpError> {
    app_state.db_client
        .get_listing_by_id(property_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ListingNotFound.to_string()))
}

pub async fn search_listings(
    Query(query_params): Query<SearchQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let filters = query_params
        .into_filters()
        .map_err(HttpError::bad_request)?;

    let now = Utc::now();
    let listings = app_state.db_client
        .search_listings(&filters, now)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    tracing::debug!(
        "Search in {} (q={:?}, type={:?}, max_price={:?}) matched {}",
        filters.category.slug(),
        filters.free_text,
        filters.property_type,
        filters.max_price,
        listings.len()
    );

    Ok(Json(serde_json::json!({
        "status": "success",
        "count": listings.len(),
        "data": ListingDto::from_listings(&listings, now)
    })))
}

pub async fn get_listings_by_category(
    Path(slug): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let category = slug
        .parse::<ListingCategory>()
        .map_err(HttpError::bad_request)?;

    if let Some(cached) = app_state.db_client.cached_category::<Vec<ListingDto>>(category).await {
        let data = ListingDto::retain_live(cached, Utc::now());
        return Ok(Json(serde_json::json!({
            "status": "success",
            "data": data
        })));
    }

    let now = Utc::now();
    let listings = app_state.db_client
        .get_listings_by_category(category, now)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let data = ListingDto::from_listings(&listings, now);
    app_state.db_client.cache_category(category, &data).await;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": data
    })))
}

pub async fn get_listing_by_id(
    Path(property_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let listing = load_listing(&app_state, property_id).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "property": ListingDto::from_listing(&listing, Utc::now())
        }
    })))
}

pub async fn create_listing(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateListingDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    validate_coordinates(body.latitude, body.longitude)
        .map_err(HttpError::bad_request)?;

    if !user.user.role.can_list() {
        return Err(HttpError::forbidden("Only owners, agents and admins can create listings"));
    }

    let now = Utc::now();
    let expires_at = match body.expires_at {
        Some(expires_at) if expires_at <= now => {
            return Err(HttpError::bad_request("expires_at must be in the future"));
        }
        Some(expires_at) => expires_at,
        None => now + Duration::days(app_state.env.listing_ttl_days),
    };

    let listing = app_state.db_client
        .create_listing(user.user.id, body, expires_at)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    app_state.db_client.invalidate_listing_cache().await;

    tracing::info!("Listing {} created by {}", listing.id, user.user.id);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "success",
            "message": "Listing created successfully",
            "data": {
                "property": ListingDto::from_listing(&listing, now)
            }
        })),
    ))
}

pub async fn update_listing(
    Path(property_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateListingDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    validate_coordinates(body.latitude, body.longitude)
        .map_err(HttpError::bad_request)?;

    let listing = load_listing(&app_state, property_id).await?;
    ensure_can_manage(&listing, &user)?;

    let updated = app_state.db_client
        .update_listing(property_id, body)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found(ErrorMessage::ListingNotFound.to_string()),
            e => HttpError::server_error(e.to_string()),
        })?;

    app_state.db_client.invalidate_listing_cache().await;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Listing updated successfully",
        "data": {
            "property": ListingDto::from_listing(&updated, Utc::now())
        }
    })))
}

pub async fn delete_listing(
    Path(property_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let listing = load_listing(&app_state, property_id).await?;
    ensure_can_manage(&listing, &user)?;

    let deleted = app_state.db_client
        .delete_listing(property_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    if !deleted {
        return Err(HttpError::not_found(ErrorMessage::ListingNotFound.to_string()));
    }

    app_state.db_client.invalidate_listing_cache().await;

    tracing::info!("Listing {} deleted by {}", property_id, user.user.id);

    Ok(Json(Response {
        status: "success",
        message: "Listing deleted successfully".to_string(),
    }))
}

pub async fn associate_images(
    Path(property_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<AssociateImagesDto>,
) -> Result<impl IntoResponse, HttpError> {
    let images = body.into_images().map_err(HttpError::bad_request)?;

    let listing = load_listing(&app_state, property_id).await?;
    ensure_can_manage(&listing, &user)?;

    let added = images.len();
    let updated = app_state.db_client
        .add_listing_images(property_id, images)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::ListingNotFound.to_string()))?;

    app_state.db_client.invalidate_listing_cache().await;

    tracing::info!("Associated {} image(s) with listing {}", added, property_id);

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": format!("{} image(s) added", added),
        "data": {
            "property": ListingDto::from_listing(&updated, Utc::now())
        }
    })))
}
