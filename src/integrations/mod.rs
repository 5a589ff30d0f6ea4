//! External service integrations.

pub mod payment_gateway {
    pub use crate::payment_gateway::*;
}

pub mod webhook_models {
    pub use crate::webhook_models::*;
}
