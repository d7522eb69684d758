//! Real-time driver.
//!
//! Runs scheduler passes on a tokio runtime. Between passes the driver
//! sleeps until the earliest deadline, or for the configured idle wait when
//! nothing is queued. Scheduling a task wakes it early, so a new deadline
//! sooner than the current sleep is honoured.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::scheduler::Scheduler;

/// Handle to a running driver. Dropping it stops the driver.
#[derive(Debug)]
pub struct Driver {
    task: JoinHandle<()>,
}

impl Driver {
    /// Stop driving. Tasks stay scheduled and can be driven again. Dropping
    /// the handle has the same effect.
    pub fn shutdown(self) {
        self.task.abort();
        tracing::debug!("scheduler driver shut down");
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Scheduler {
    /// Drive this scheduler in real time on `runtime`.
    pub fn spawn_driver(&self, runtime: &Handle) -> Driver {
        let scheduler = self.clone();
        let task = runtime.spawn(async move {
            let idle = scheduler.config().driver_idle_wait();
            loop {
                let fired = scheduler.run_pending();
                tracing::trace!(fired, "scheduler pass");

                let wait = match scheduler.next_deadline() {
                    Some(deadline) => {
                        let now = scheduler.now_nanos();
                        Duration::from_nanos(deadline.saturating_sub(now)).min(idle)
                    }
                    None => idle,
                };
                if wait.is_zero() {
                    tokio::task::yield_now().await;
                    continue;
                }

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = scheduler.inner.wake.notified() => {}
                }
            }
        });
        Driver { task }
    }
}
