use moka::future::Cache;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::AppError;

/// Rejects a second mutating request on a booking while the first is still
/// running. Entries expire after the TTL, so a crashed request cannot lock a
/// booking for longer than that.
#[derive(Clone)]
pub struct InFlightGuard {
    cache: Cache<i64, Uuid>,
}

impl InFlightGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(10_000)
                .build(),
        }
    }

    /// Runs `work` while holding the booking's slot.
    pub async fn run<T, F>(&self, vendor_booking_id: i64, work: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let token = Uuid::new_v4();
        let entry = self
            .cache
            .entry(vendor_booking_id)
            .or_insert(token)
            .await;

        if !entry.is_fresh() {
            tracing::warn!(
                "Duplicate request blocked, booking {} is already being updated",
                vendor_booking_id
            );
            return Err(AppError::Conflict(format!(
                "Booking {} is already being updated, try again shortly",
                vendor_booking_id
            )));
        }

        let result = work.await;
        self.cache.invalidate(&vendor_booking_id).await;
        result
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_concurrent_request_on_same_booking_is_rejected() {
        let guard = InFlightGuard::default();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let first = {
            let guard = guard.clone();
            tokio::spawn(async move {
                guard
                    .run(7, async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, AppError>("first")
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        let second = guard.run(7, async { Ok::<_, AppError>("second") }).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        // Other bookings are unaffected.
        assert_eq!(guard.run(8, async { Ok::<_, AppError>(8) }).await.unwrap(), 8);

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), "first");

        let third = guard.run(7, async { Ok::<_, AppError>("third") }).await;
        assert_eq!(third.unwrap(), "third");
    }

    #[tokio::test]
    async fn test_slot_released_after_error() {
        let guard = InFlightGuard::default();
        let failed: Result<(), AppError> = guard
            .run(1, async { Err(AppError::BadRequest("nope".to_string())) })
            .await;
        assert!(failed.is_err());
        assert!(guard.run(1, async { Ok::<_, AppError>(()) }).await.is_ok());
    }
}
