use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};

use jobsim_core::types::Timestamp;

use crate::message::JobEvent;

/// Receiver half handed to an observer on [`NotificationHub::attach`].
pub type ObserverReceiver = mpsc::UnboundedReceiver<JobEvent>;

/// A single attached observer.
struct Observer {
    sender: mpsc::UnboundedSender<JobEvent>,
    /// When this observer attached.
    attached_at: Timestamp,
}

/// Registry of every observer that should see job events.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Delivery is best-effort: an observer
/// whose channel has closed is skipped and detached, never reported to the
/// publisher.
pub struct NotificationHub {
    observers: RwLock<HashMap<String, Observer>>,
}

impl NotificationHub {
    /// Create a hub with no observers.
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
        }
    }

    /// Attach an observer under `observer_id`.
    ///
    /// Returns the receiving end of the observer's channel. Attaching again
    /// with the same id replaces the earlier observer, whose receiver then
    /// closes.
    pub async fn attach(&self, observer_id: impl Into<String>) -> ObserverReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = Observer {
            sender: tx,
            attached_at: chrono::Utc::now(),
        };
        self.observers
            .write()
            .await
            .insert(observer_id.into(), observer);
        rx
    }

    /// Detach an observer. Unknown ids are ignored.
    pub async fn detach(&self, observer_id: &str) {
        if let Some(observer) = self.observers.write().await.remove(observer_id) {
            let attached_secs = (chrono::Utc::now() - observer.attached_at).num_seconds();
            tracing::debug!(observer_id, attached_secs, "Observer detached");
        }
    }

    /// Deliver `event` to every attached observer.
    ///
    /// Observers whose receiver has been dropped are skipped and detached
    /// before this returns. Returns the number of observers reached.
    pub async fn publish(&self, event: JobEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let observers = self.observers.read().await;
            for (id, observer) in observers.iter() {
                if observer.sender.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(id.clone());
                }
            }
        }

        if !closed.is_empty() {
            let mut observers = self.observers.write().await;
            for id in &closed {
                // Re-check: the id may have been re-attached in between.
                if observers.get(id).is_some_and(|o| o.sender.is_closed()) {
                    observers.remove(id);
                }
            }
            tracing::debug!(count = closed.len(), "Detached closed observers");
        }

        tracing::debug!(
            event_type = event.event_type(),
            job_id = %event.job().id,
            delivered,
            "Published job event",
        );
        delivered
    }

    /// Current number of attached observers.
    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Detach every observer. Their receivers end once drained.
    ///
    /// Used during graceful shutdown.
    pub async fn close_all(&self) {
        let mut observers = self.observers.write().await;
        let count = observers.len();
        observers.clear();
        tracing::info!(count, "Detached all observers");
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}
