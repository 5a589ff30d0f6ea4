use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::time::Duration;

/// Breaker guarding calls to the payment provider.
pub type PaymentCircuitBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates the circuit breaker for payment provider calls, so an outage
/// fails fast instead of stacking 30s timeouts.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// Only provider faults (network errors, 5xx) count as failures; a declined
/// card is a normal answer. See `payment_gateway`.
pub fn create_payment_circuit_breaker() -> PaymentCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::{CircuitBreaker, Error};

    #[test]
    fn test_circuit_breaker_opens_after_failures() {
        let cb = create_payment_circuit_breaker();

        for _ in 0..5 {
            let result: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("provider down"));
            assert!(result.is_err());
        }

        let result: Result<(), Error<&str>> = cb.call(|| Ok::<(), &str>(()));
        assert!(matches!(result, Err(Error::Rejected)));
    }

    #[test]
    fn test_circuit_breaker_allows_success() {
        let cb = create_payment_circuit_breaker();

        let result: Result<i32, Error<&str>> = cb.call(|| Ok::<i32, &str>(42));

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_ignored_errors_keep_circuit_closed() {
        use failsafe::futures::CircuitBreaker as AsyncCircuitBreaker;

        let cb = create_payment_circuit_breaker();
        for _ in 0..10 {
            let result = AsyncCircuitBreaker::call_with(&cb, |_: &&str| false, async {
                Err::<(), &str>("card declined")
            })
            .await;
            assert!(matches!(result, Err(Error::Inner("card declined"))));
        }

        assert!(CircuitBreaker::is_call_permitted(&cb));
    }
}
