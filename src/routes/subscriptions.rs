use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::accounts::AccountService;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::response::ApiResponse;

/// POST /api/v1/subscriptions/c/{channel_id}
///
/// Subscribes when not subscribed, unsubscribes otherwise.
pub async fn toggle_subscription(
    user: web::ReqData<AuthenticatedUser>,
    channel_id: web::Path<Uuid>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let subscribed = accounts
        .toggle_subscription(user.id, channel_id.into_inner())
        .await?;

    let message = if subscribed {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(ApiResponse::ok(serde_json::json!({ "subscribed": subscribed }), message).into_response())
}
