use super::*;
use fieldflow_domain::BackoffKind;

/// Delay to wait after failed attempt `failed_attempt` (1-based) before the next one.
///
/// Exponential: `base * 2^(failed_attempt - 1)`; fixed: `base`. Both capped at `max`.
#[must_use]
pub fn backoff_delay(
    kind: BackoffKind,
    failed_attempt: u16,
    base: Duration,
    max: Duration,
) -> Duration {
    let delay = match kind {
        BackoffKind::Fixed => base,
        BackoffKind::Exponential => {
            let exponent = u32::from(failed_attempt.saturating_sub(1)).min(31);
            base.saturating_mul(1_u32 << exponent)
        }
    };

    delay.min(max)
}
