use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::models::{PaymentStatus, TransactionDetails};
use crate::normalize::extract_transaction_details;

/// Payment provider webhook body - a single event or an array of events.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PaymentWebhookPayload {
    Single(PaymentWebhookEvent),
    Batch(Vec<PaymentWebhookEvent>),
}

impl PaymentWebhookPayload {
    /// Convert to a vec of events for uniform processing
    pub fn into_events(self) -> Vec<PaymentWebhookEvent> {
        match self {
            PaymentWebhookPayload::Single(event) => vec![event],
            PaymentWebhookPayload::Batch(events) => events,
        }
    }
}

/// Individual provider event, e.g. `payment_intent.succeeded`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PaymentWebhookEvent {
    /// Provider event id
    #[serde(default)]
    pub id: Option<String>,

    /// Event type
    #[serde(rename = "type")]
    pub event_type: String,

    /// `{ "object": <payment intent> }` or the intent itself
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
}

impl PaymentWebhookEvent {
    /// Payment status the event reports. `None` for events we do not track.
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        match self.event_type.as_str() {
            "payment_intent.succeeded" => Some(PaymentStatus::Succeeded),
            "payment_intent.payment_failed" => Some(PaymentStatus::Failed),
            "payment_intent.canceled" => Some(PaymentStatus::Canceled),
            "payment_intent.processing" => Some(PaymentStatus::Processing),
            _ => None,
        }
    }

    pub fn intent(&self) -> Option<TransactionDetails> {
        let object = self.data.get("object").unwrap_or(&self.data);
        extract_transaction_details(object)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookResponse {
    pub status: String,
    pub received: usize,
    pub processed: usize,
    pub ignored: usize,
}
