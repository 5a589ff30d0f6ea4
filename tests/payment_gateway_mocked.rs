/// HTTP payment gateway tests against a mocked provider.
/// Exercises the wire format, error mapping and circuit breaker without
/// hitting a real payment API.
use vendor_bookings_api::core::errors::AppError;
use vendor_bookings_api::core::models::{PaymentMethod, PaymentPurpose};
use vendor_bookings_api::integrations::payment_gateway::{
    idempotency_key, HttpPaymentGateway, PaymentGateway, PaymentIntentRequest, RefundRequest,
};
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn intent_request(purpose: PaymentPurpose, amount_cents: i64) -> PaymentIntentRequest {
    PaymentIntentRequest {
        vendor_booking_id: 42,
        vendor_id: 5,
        purpose,
        amount_cents,
        currency: "usd".to_string(),
        payment_method: PaymentMethod::Card,
        idempotency_key: idempotency_key(42, 5, purpose, amount_cents, 1_700_000_000),
    }
}

#[tokio::test]
async fn test_payment_intent_successful_response() {
    let mock_server = MockServer::start().await;
    let key = idempotency_key(42, 5, PaymentPurpose::Booking, 10_000, 1_700_000_000);

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header("authorization", "Bearer sk_test"))
        .and(header("idempotency-key", key.as_str()))
        .and(body_string_contains("amount=10000"))
        .and(body_string_contains("metadata%5Bpurpose%5D=booking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "pi_123",
            "object": "payment_intent",
            "amount": 10000,
            "currency": "usd",
            "status": "succeeded",
            "client_secret": "pi_123_secret_abc"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = HttpPaymentGateway::new(mock_server.uri(), "sk_test".to_string()).unwrap();
    let intent = gateway
        .create_payment_intent(intent_request(PaymentPurpose::Booking, 10_000))
        .await
        .unwrap();

    assert_eq!(intent.id, "pi_123");
    assert_eq!(intent.amount_cents, Some(10_000));
    assert_eq!(intent.status.as_deref(), Some("succeeded"));
    assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));
}

#[tokio::test]
async fn test_card_declined_maps_to_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
            "error": {"type": "card_error", "message": "Your card was declined."}
        })))
        .mount(&mock_server)
        .await;

    let gateway = HttpPaymentGateway::new(mock_server.uri(), "sk_test".to_string()).unwrap();

    // Declines never open the breaker.
    for _ in 0..8 {
        let err = gateway
            .create_payment_intent(intent_request(PaymentPurpose::Reschedule, 500))
            .await
            .unwrap_err();
        match err {
            AppError::ExternalApiError(msg) => assert!(msg.contains("Your card was declined.")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_provider_outage_opens_circuit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&mock_server)
        .await;

    let gateway = HttpPaymentGateway::new(mock_server.uri(), "sk_test".to_string()).unwrap();

    for _ in 0..5 {
        let err = gateway
            .create_payment_intent(intent_request(PaymentPurpose::Booking, 10_000))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    // Sixth call is rejected locally; the mock's expect(5) verifies it never left.
    let err = gateway
        .create_payment_intent(intent_request(PaymentPurpose::Booking, 10_000))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("temporarily unavailable"));
}

#[tokio::test]
async fn test_refund_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .and(header_exists("idempotency-key"))
        .and(body_string_contains("payment_intent=pi_123"))
        .and(body_string_contains("amount=8000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "re_1",
            "amount": 8000,
            "status": "succeeded"
        })))
        .mount(&mock_server)
        .await;

    let gateway = HttpPaymentGateway::new(mock_server.uri(), "sk_test".to_string()).unwrap();
    let refund = gateway
        .create_refund(RefundRequest {
            payment_intent_id: "pi_123".to_string(),
            amount_cents: 8000,
            idempotency_key: "refund-key".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(refund.id, "re_1");
    assert_eq!(refund.amount_cents, Some(8000));
    assert_eq!(refund.status.as_deref(), Some("succeeded"));
}
