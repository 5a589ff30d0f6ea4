use crate::errors::AppError;
use crate::handlers::AppState;
use crate::services::PaymentEventOutcome;
use crate::webhook_models::{PaymentWebhookEvent, PaymentWebhookPayload, WebhookResponse};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

/// POST /api/v1/webhooks/payments
///
/// Receives payment provider events. Validates the webhook secret, records the
/// reported status on the stored payment and confirms pending bookings whose
/// payment succeeded.
///
/// Expected payload: single event object OR array of events
/// Authentication: X-Webhook-Token header must match PAYMENT_WEBHOOK_SECRET
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payments",
    tag = "webhooks",
    request_body = PaymentWebhookEvent,
    params(("X-Webhook-Token" = Option<String>, Header, description = "Shared webhook secret")),
    responses(
        (status = 200, description = "Events received", body = WebhookResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorMessage)
    )
)]
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<PaymentWebhookPayload>,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    tracing::info!("Received payment webhook");

    validate_webhook_secret(&state, &headers)?;

    let events = payload.into_events();
    let total_received = events.len();
    tracing::info!("Processing {} webhook event(s)", total_received);

    let mut processed = 0;
    let mut ignored = 0;

    for event in events {
        match process_webhook_event(&state, &event).await {
            Ok(ProcessResult::Processed) => processed += 1,
            Ok(ProcessResult::Ignored) => {
                ignored += 1;
                tracing::debug!("Ignored webhook event {:?} ({})", event.id, event.event_type);
            }
            Err(e) => {
                // Continue processing other events even if one fails
                tracing::error!("Failed to process webhook event {:?}: {}", event.id, e);
            }
        }
    }

    tracing::info!(
        "Webhook processing complete: {} received, {} processed, {} ignored",
        total_received,
        processed,
        ignored
    );

    Ok((
        StatusCode::OK,
        Json(WebhookResponse {
            status: "received".to_string(),
            received: total_received,
            processed,
            ignored,
        }),
    ))
}

/// Validate webhook secret from X-Webhook-Token header
fn validate_webhook_secret(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    // No secret configured: accept (a warning is logged at startup)
    let Some(ref expected_secret) = state.config.payment_webhook_secret else {
        return Ok(());
    };

    let token = headers
        .get("X-Webhook-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Webhook-Token header".to_string()))?;

    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid payment webhook token received");
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }

    Ok(())
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[derive(Debug)]
enum ProcessResult {
    Processed,
    Ignored,
}

async fn process_webhook_event(
    state: &AppState,
    event: &PaymentWebhookEvent,
) -> Result<ProcessResult, AppError> {
    let Some(status) = event.payment_status() else {
        return Ok(ProcessResult::Ignored);
    };
    let Some(intent) = event.intent() else {
        tracing::warn!("Webhook event {} carries no payment intent id", event.event_type);
        return Ok(ProcessResult::Ignored);
    };

    tracing::debug!(
        "Applying {} to payment intent {}",
        status.as_str(),
        intent.id
    );

    match state.service.apply_payment_event(&intent.id, status).await? {
        PaymentEventOutcome::Applied => Ok(ProcessResult::Processed),
        PaymentEventOutcome::UnknownIntent => {
            tracing::info!("No stored payment for intent {}", intent.id);
            Ok(ProcessResult::Ignored)
        }
        PaymentEventOutcome::Stale => Ok(ProcessResult::Ignored),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("whsec_abc", "whsec_abc"));
        assert!(!constant_time_compare("whsec_abc", "whsec_abd"));
        assert!(!constant_time_compare("whsec_abc", "whsec_ab"));
        assert!(constant_time_compare("", ""));
    }
}
