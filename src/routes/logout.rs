//! POST /auth/signout

use axum::response::Redirect;

use crate::guard::{SIGN_IN_PATH, ServerClient};

/// End the session and send the browser to the sign-in page.
pub async fn sign_out(ServerClient(client): ServerClient) -> Redirect {
    if let Err(e) = client.sign_out().await {
        tracing::warn!(error = %e, "sign-out failed");
    }
    Redirect::to(SIGN_IN_PATH)
}
