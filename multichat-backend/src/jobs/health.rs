//! Marks models healthy when the kernel lists an executor for them.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

use super::{DispatchContext, JobError, JobOutcome};

const THROTTLE_WINDOW: Duration = Duration::from_secs(5);

/// Admits at most one health check per window; the rest are dropped.
pub struct HealthThrottle {
    window: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl HealthThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_run: Mutex::new(None),
        }
    }

    pub fn try_acquire(&self) -> bool {
        let mut last_run = self.last_run.lock();
        let now = Instant::now();
        match *last_run {
            Some(at) if now.duration_since(at) < self.window => false,
            _ => {
                *last_run = Some(now);
                true
            }
        }
    }
}

impl Default for HealthThrottle {
    fn default() -> Self {
        Self::new(THROTTLE_WINDOW)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HealthCheckJob;

impl HealthCheckJob {
    pub async fn handle(&self, ctx: &DispatchContext) -> Result<JobOutcome, JobError> {
        if !ctx.health_throttle.try_acquire() {
            log::debug!("[HEALTH] Throttled, dropping health check");
            return Ok(JobOutcome::Skipped);
        }

        let location = ctx.config.kernel_location(&ctx.db);
        if location.trim().is_empty() {
            log::error!("[HEALTH] Kernel location is not configured");
            return Ok(JobOutcome::Completed);
        }
        let base = format!("{}/{}", location, ctx.config.kernel_api_version);

        let listing = match ctx.kernel.worker_debug(&base).await {
            Ok(body) => body,
            Err(e) => {
                log::error!("[HEALTH] Worker listing from {} failed: {}", base, e);
                return Ok(JobOutcome::Completed);
            }
        };

        let healthy: Vec<i64> = ctx
            .db
            .list_llms()?
            .into_iter()
            .filter(|llm| is_listed(&listing, &llm.access_code))
            .map(|llm| llm.id)
            .collect();
        let updated = ctx.db.mark_llms_healthy(&healthy)?;
        log::debug!("[HEALTH] {} model(s) have a live executor", updated);
        Ok(JobOutcome::Completed)
    }
}

/// The debug listing quotes every registered access code.
fn is_listed(listing: &str, access_code: &str) -> bool {
    !access_code.is_empty()
        && (listing.contains(&format!("'{}'", access_code))
            || listing.contains(&format!("\"{}\"", access_code)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_window() {
        let throttle = HealthThrottle::new(Duration::from_millis(50));
        assert!(throttle.try_acquire());
        assert!(!throttle.try_acquire());
        std::thread::sleep(Duration::from_millis(60));
        assert!(throttle.try_acquire());
    }

    #[test]
    fn test_access_code_must_be_quoted() {
        let listing = r#"{'llama3': [...], "gemma-2b": [...]} taide"#;
        assert!(is_listed(listing, "llama3"));
        assert!(is_listed(listing, "gemma-2b"));
        assert!(!is_listed(listing, "taide"));
        assert!(!is_listed(listing, "llama"));
        assert!(!is_listed(listing, ""));
    }
}
