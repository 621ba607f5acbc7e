use crate::jobs::{HealthCheckJob, Job, JobQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often a health check is enqueued
    pub health_check_interval: Duration,
}

impl SchedulerConfig {
    pub fn new(health_check_interval: Duration) -> Self {
        SchedulerConfig { health_check_interval }
    }
}

/// Enqueues the periodic background jobs. The jobs themselves run on the
/// worker like any other; the scheduler only decides when.
pub struct Scheduler {
    queue: JobQueue,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(queue: JobQueue, config: SchedulerConfig) -> Self {
        Scheduler { queue, config }
    }

    /// Start the scheduler background task
    pub async fn start(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) {
        log::info!(
            "[SCHEDULER] Started (health check every {:?})",
            self.config.health_check_interval
        );

        let mut ticker = interval(self.config.health_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    log::info!("[SCHEDULER] Received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        log::info!("[SCHEDULER] Stopped");
    }

    fn tick(&self) {
        self.queue.dispatch(Job::Health(HealthCheckJob));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::queue::JobKind;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_ticks_enqueue_health_checks_until_shutdown() {
        let (queue, mut receiver) = JobQueue::new();
        let scheduler = Arc::new(Scheduler::new(queue, SchedulerConfig::new(Duration::from_millis(10))));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(Arc::clone(&scheduler).start(shutdown_rx));

        for _ in 0..2 {
            let job = timeout(Duration::from_secs(1), receiver.recv())
                .await
                .expect("tick within a second")
                .expect("queue open");
            assert_eq!(job.kind(), JobKind::Health);
        }

        shutdown_tx.send(()).unwrap();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler stops")
            .unwrap();
    }
}
