//! Imports legacy booking exports into Postgres.
//!
//! Usage: `import_legacy_bookings <bookings.json>` where the file holds a JSON
//! array of booking records in any of the historical field layouts. Records
//! whose legacy id was imported before are skipped, so the import can be
//! re-run.

use anyhow::Context;
use dotenvy::dotenv;
use serde_json::Value;
use std::env;

use vendor_bookings_api::db::Database;
use vendor_bookings_api::db_storage::PgBookingRepository;
use vendor_bookings_api::normalize::legacy_booking;
use vendor_bookings_api::storage::BookingRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let path = env::args()
        .nth(1)
        .context("usage: import_legacy_bookings <bookings.json>")?;
    let database_url = env::var("DB_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .context("DB_URL or DATABASE_URL must be set")?;

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    let records: Vec<Value> =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON array", path))?;

    let db = Database::new(&database_url).await?;
    let repo = PgBookingRepository::new(db.pool);

    let total = records.len();
    tracing::info!("Importing {} legacy booking record(s) from {}", total, path);

    let mut imported = 0;
    let mut skipped = 0;
    let mut invalid = 0;
    let mut errors = 0;

    for (index, record) in records.iter().enumerate() {
        if index > 0 && index % 500 == 0 {
            tracing::info!(
                "Processed {}/{} records (Imported: {}, Skipped: {}, Invalid: {}, Errors: {})",
                index,
                total,
                imported,
                skipped,
                invalid,
                errors
            );
        }

        let (legacy_id, booking) = match legacy_booking(record) {
            Ok(parsed) => parsed,
            Err(reason) => {
                tracing::warn!("Record {} rejected: {}", index, reason);
                invalid += 1;
                continue;
            }
        };

        let result = match legacy_id {
            Some(legacy_id) => repo.insert_imported(legacy_id, booking).await,
            None => repo.insert(booking).await.map(Some),
        };

        match result {
            Ok(Some(stored)) => {
                tracing::debug!(
                    "Record {} imported as booking {}",
                    index,
                    stored.vendor_booking_id
                );
                imported += 1;
            }
            Ok(None) => skipped += 1,
            Err(e) => {
                tracing::error!("Record {} failed: {}", index, e);
                errors += 1;
            }
        }
    }

    tracing::info!(
        "Import finished: {} total, {} imported, {} already present, {} invalid, {} errors",
        total,
        imported,
        skipped,
        invalid,
        errors
    );

    if errors > 0 {
        anyhow::bail!("{} record(s) could not be stored", errors);
    }
    Ok(())
}
