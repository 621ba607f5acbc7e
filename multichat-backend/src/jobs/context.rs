use std::sync::Arc;

use crate::bus::MessageBus;
use crate::config::Config;
use crate::db::Database;
use crate::kernel::KernelApi;

use super::{CompletionNotifier, HealthThrottle, JobQueue};

/// Everything a running job may touch. Jobs share no other state.
pub struct DispatchContext {
    pub db: Arc<Database>,
    pub bus: Arc<dyn MessageBus>,
    pub kernel: Arc<dyn KernelApi>,
    pub config: Config,
    pub notifier: CompletionNotifier,
    pub health_throttle: HealthThrottle,
    pub queue: JobQueue,
}

impl DispatchContext {
    pub fn new(
        db: Arc<Database>,
        bus: Arc<dyn MessageBus>,
        kernel: Arc<dyn KernelApi>,
        config: Config,
        queue: JobQueue,
    ) -> Self {
        Self {
            db,
            bus,
            kernel,
            config,
            notifier: CompletionNotifier::new(),
            health_throttle: HealthThrottle::default(),
            queue,
        }
    }
}
