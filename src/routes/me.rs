//! GET /api/user

use axum::Json;

use crate::error::AppError;
use crate::guard::ServerClient;
use crate::types::UserInfoResponse;

/// Current user as the identity provider sees it.
pub async fn current_user(
    ServerClient(client): ServerClient,
) -> Result<Json<UserInfoResponse>, AppError> {
    let user = client.get_user().await?.ok_or(AppError::NotAuthenticated)?;
    Ok(Json(user.into()))
}
