use serde::Deserialize;

/// Default reschedule fee charged before a confirmed booking can move.
pub const RESCHEDULE_FEE_CENTS: i64 = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres URL. `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub payment_api_base_url: String,
    pub payment_api_key: String,
    /// Shared secret expected in `X-Webhook-Token` on payment webhooks.
    pub payment_webhook_secret: Option<String>,
    pub payment_currency: String,
    pub reschedule_fee_cents: i64,
    pub default_page_limit: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: match std::env::var("DB_URL").or_else(|_| std::env::var("DATABASE_URL")) {
                Ok(url) if !url.trim().is_empty() => {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Some(url)
                }
                _ => None,
            },
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            payment_api_base_url: std::env::var("PAYMENT_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string())
                .trim()
                .trim_end_matches('/')
                .to_string(),
            payment_api_key: std::env::var("PAYMENT_API_KEY")
                .map_err(|_| anyhow::anyhow!("PAYMENT_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("PAYMENT_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            payment_webhook_secret: std::env::var("PAYMENT_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            payment_currency: std::env::var("PAYMENT_CURRENCY")
                .unwrap_or_else(|_| "usd".to_string())
                .to_lowercase(),
            reschedule_fee_cents: std::env::var("RESCHEDULE_FEE_CENTS")
                .unwrap_or_else(|_| RESCHEDULE_FEE_CENTS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RESCHEDULE_FEE_CENTS must be a whole number"))
                .and_then(|fee: i64| {
                    if fee < 0 {
                        anyhow::bail!("RESCHEDULE_FEE_CENTS cannot be negative");
                    }
                    Ok(fee)
                })?,
            default_page_limit: std::env::var("DEFAULT_PAGE_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DEFAULT_PAGE_LIMIT must be a positive number"))?,
        };

        config.validate()?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match config.database_url {
            Some(ref url) => {
                tracing::debug!("Database URL: {}...", url_prefix(url, 20))
            }
            None => tracing::warn!("DATABASE_URL not set, bookings are kept in memory"),
        }
        tracing::debug!("Payment API base URL: {}", config.payment_api_base_url);
        if config.payment_webhook_secret.is_none() {
            tracing::warn!("PAYMENT_WEBHOOK_SECRET not set, payment webhooks are not authenticated");
        }
        tracing::debug!("Reschedule fee: {} cents", config.reschedule_fee_cents);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Checks values that can be wrong even when every variable parsed.
    pub fn validate(&self) -> anyhow::Result<()> {
        let base = url::Url::parse(&self.payment_api_base_url).map_err(|e| {
            anyhow::anyhow!("PAYMENT_API_BASE_URL is not a valid URL: {}", e)
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            anyhow::bail!("PAYMENT_API_BASE_URL must start with http:// or https://");
        }
        if self.payment_currency.len() != 3
            || !self.payment_currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            anyhow::bail!("PAYMENT_CURRENCY must be a three letter ISO code");
        }
        if self.default_page_limit == 0 || self.default_page_limit > crate::pagination::MAX_LIMIT
        {
            anyhow::bail!(
                "DEFAULT_PAGE_LIMIT must be between 1 and {}",
                crate::pagination::MAX_LIMIT
            );
        }
        Ok(())
    }
}

/// First `chars` characters of a URL, for logs that must not leak credentials.
fn url_prefix(url: &str, chars: usize) -> String {
    url.chars().take(chars).collect()
}
