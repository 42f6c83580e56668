use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use motormart_core::TenantId;
use motormart_events::{EventBus, Subscription, TenantScoped};

/// How long the worker blocks on the subscription before re-checking the
/// stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Handle to a running projection worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Signal the worker to stop and wait for its thread to finish.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Background loop that feeds bus messages into projection handlers.
///
/// Delivery is at-least-once, so handlers must be idempotent (the
/// projections already are, via their sequence cursors). A handler error is
/// logged and the message is skipped; the worker never dies on bad input.
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Spawn a named worker thread consuming a fresh bus subscription.
    ///
    /// `tenant_id` restricts the worker to a single tenant's messages;
    /// pass `None` to process all tenants.
    pub fn spawn<M, B, H, E>(
        name: &'static str,
        bus: B,
        tenant_id: Option<TenantId>,
        mut handler: H,
    ) -> WorkerHandle
    where
        M: TenantScoped + Send + 'static,
        B: EventBus<M> + Send + Sync + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let subscription: Subscription<M> = bus.subscribe();

        let stop_flag = stop.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    let msg = match subscription.recv_timeout(POLL_INTERVAL) {
                        Ok(msg) => msg,
                        Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                    };

                    if tenant_id.is_some_and(|t| msg.tenant_id() != t) {
                        continue;
                    }

                    if let Err(err) = handler(msg) {
                        warn!(worker = name, error = ?err, "projection handler rejected message");
                    }
                }
            })
            .expect("failed to spawn projection worker thread");

        WorkerHandle {
            stop,
            join: Some(join),
        }
    }
}
