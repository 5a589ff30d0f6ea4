//! Vendor Bookings API Library
//!
//! Booking lifecycle (creation, payment, reschedule, cancellation/refund),
//! vendor onboarding portals and the event discovery catalog, served over
//! axum on Postgres or in-memory repositories.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Booking rules, money math and shared errors/models.
//! - `integrations`: Payment provider client and webhook payloads.
//! - `availability`: Slot overlap checks.
//! - `catalog`: Static event discovery catalog.
//! - `circuit_breaker`: Circuit breaker for payment provider calls.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Postgres repositories.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `lifecycle`: Booking status transitions.
//! - `memory_storage`: In-memory repositories.
//! - `models`: Booking and payment models.
//! - `money`: Formatting and cancellation breakdown.
//! - `normalize`: Legacy payload normalization.
//! - `onboarding`: Vendor onboarding portal records.
//! - `openapi`: OpenAPI document.
//! - `pagination`: Page requests and list envelopes.
//! - `payment_gateway`: Payment provider client.
//! - `request_guard`: Per-booking in-flight guard.
//! - `routes`: Router assembly.
//! - `services`: Booking flows.
//! - `storage`: Repository traits.
//! - `validation`: Schedule and contact field validation.
//! - `webhook_handler`: Payment webhook handler.
//! - `webhook_models`: Webhook payload models.

pub mod api;
pub mod core;
pub mod integrations;

pub mod availability;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod lifecycle;
pub mod memory_storage;
pub mod models;
pub mod money;
pub mod normalize;
pub mod onboarding;
pub mod openapi;
pub mod pagination;
pub mod payment_gateway;
pub mod request_guard;
pub mod routes;
pub mod services;
pub mod storage;
pub mod validation;
pub mod webhook_handler;
pub mod webhook_models;
