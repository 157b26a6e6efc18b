//13
use axum::{response::IntoResponse, routing::get, Extension, Json, Router};

use crate::{
    dtos::userdtos::{FilterUserDto, UserData, UserResponseDto},
    error::HttpError,
    middleware::JWTAuthMiddeware,
};

pub fn users_handler() -> Router {
    Router::new().route("/me", get(get_me))
}

pub async fn get_me(
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let filtered_user = FilterUserDto::filter_user(&user.user);

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: filtered_user,
        },
    }))
}
