use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{propertydb::PropertyExt, userdb::UserExt},
    dtos::{
        propertydtos::ListingDto,
        userdtos::{FilterUserDto, RequestQueryDto, RoleUpdateDto, UserData, UserListResponseDto, UserResponseDto},
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    models::propertymodel::{Listing, ListingStatus},
    service::listing_expiry::run_listing_sweep,
    AppState,
};

/// Back-office routes. Mounted behind `auth` + an admin `role_check`.
pub fn admin_handler() -> Router {
    Router::new()
        .route("/users", get(get_users))
        .route("/users/:user_id/role", put(update_user_role))
        .route("/listings", get(get_all_listings))
        .route("/listings/sweep", post(trigger_listing_sweep))
}

pub async fn get_users(
    Query(query_params): Query<RequestQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1) as u32;
    let limit = query_params.limit.unwrap_or(10);

    let users = app_state.db_client
        .get_users(page, limit)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let user_count = app_state.db_client
        .get_user_count()
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(UserListResponseDto {
        status: "success".to_string(),
        users: FilterUserDto::filter_users(&users),
        results: user_count,
    }))
}

pub async fn update_user_role(
    Path(user_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<JWTAuthMiddeware>,
    Json(body): Json<RoleUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    if admin.user.id == user_id {
        return Err(HttpError::bad_request("Admins cannot change their own role"));
    }

    let user = app_state.db_client
        .update_user_role(user_id, body.role)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found("User not found"),
            e => HttpError::server_error(e.to_string()),
        })?;

    tracing::info!("Admin {} set role of {} to {}", admin.user.id, user.id, user.role.to_str());

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&user),
        },
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminListingQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<usize>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
    pub status: Option<ListingStatus>,
}

pub async fn get_all_listings(
    Query(query_params): Query<AdminListingQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1) as u32;
    let limit = query_params.limit.unwrap_or(20);

    let listings = app_state.db_client
        .get_all_listings(query_params.status, page, limit)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let total = app_state.db_client
        .count_listings(query_params.status)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(listing_page(&listings, page, limit, total, Utc::now())))
}

/// One page of the admin listing view; `total` counts every matching listing.
pub fn listing_page(
    listings: &[Listing],
    page: u32,
    limit: usize,
    total: i64,
    now: DateTime<Utc>,
) -> serde_json::Value {
    serde_json::json!({
        "status": "success",
        "data": {
            "listings": ListingDto::from_listings(listings, now),
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total
            }
        }
    })
}

pub async fn trigger_listing_sweep(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    tracing::info!("Listing sweep triggered by admin {}", admin.user.id);

    let report = run_listing_sweep(&app_state).await;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": report
    })))
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use axum::http::StatusCode;
    use chrono::Duration;
    use http_body_util::BodyExt;

    use super::*;
    use crate::{
        models::{
            propertymodel::fixtures::listing,
            usermodel::{User, UserRole},
        },
        test_support::{test_config, test_state_with_acquire_timeout},
    };

    fn admin() -> JWTAuthMiddeware {
        JWTAuthMiddeware {
            user: User {
                id: Uuid::new_v4(),
                name: "Back Office".to_string(),
                email: "admin@estatehub.mu".to_string(),
                password: String::new(),
                role: UserRole::Admin,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_listing_page_total_is_not_the_page_size() {
        let now = Utc::now();
        let listings = vec![
            listing(ListingStatus::Active, now + Duration::days(5)),
            listing(ListingStatus::Expired, now - Duration::days(1)),
        ];

        let body = listing_page(&listings, 3, 2, 47, now);

        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["listings"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["pagination"]["page"], 3);
        assert_eq!(body["data"]["pagination"]["limit"], 2);
        assert_eq!(body["data"]["pagination"]["total"], 47);
    }

    #[tokio::test]
    async fn test_manual_sweep_reports_unreachable_store() {
        let state = test_state_with_acquire_timeout(test_config(), StdDuration::from_millis(200));

        let response = tokio::time::timeout(
            StdDuration::from_secs(5),
            trigger_listing_sweep(Extension(state), Extension(admin())),
        )
        .await
        .expect("sweep did not finish")
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["query_failed"], true);
        assert_eq!(body["data"]["matched"], 0);
        assert_eq!(body["data"]["expired"], 0);
    }
}
