use std::{fmt::Display, time::Duration};
use tokio::time::sleep;
use tracing::{error, info};

/// Runs `f` until it succeeds or `max_retries` attempts failed, doubling the
/// wait after every failure starting from `base_delay`.
pub async fn retry_with_backoff<F, Fut, R, E>(
    mut f: F,
    max_retries: u8,
    base_delay: Duration,
) -> Result<R, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: Display,
{
    let mut curr_try: u8 = 1;
    loop {
        match f().await {
            Ok(v) => {
                return Ok(v);
            }
            Err(e) => {
                error!(error=%e,retry=%curr_try,"Error happened while running closure");
                if curr_try >= max_retries {
                    error!("Reached max retries return error");
                    return Err(e);
                }
            }
        }
        let sleep_duration = base_delay.saturating_mul(2u32.saturating_pow(u32::from(curr_try) - 1));
        curr_try += 1;
        info!(?sleep_duration, "Waiting before retry");
        sleep(sleep_duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};

    #[tokio::test]
    async fn stops_at_first_success() {
        let attempts = &AtomicU8::new(0);
        let result: Result<u8, String> = retry_with_backoff(
            move || async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 { Err(format!("attempt {attempt} failed")) } else { Ok(attempt) }
            },
            5,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_max_retries() {
        let attempts = &AtomicU8::new(0);
        let result: Result<(), String> = retry_with_backoff(
            move || async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("attempt {attempt} failed"))
            },
            2,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Err("attempt 2 failed".to_owned()));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
