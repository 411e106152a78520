use async_trait::async_trait;
use futures::future::join_all;
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, RwLock, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BusError, MessageBus, MessageHandler};

const DISPATCH_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// In-process bus with one queue and one dispatch task per subject.
///
/// Handlers for a subject therefore run strictly one after another, while
/// handlers on different subjects proceed independently. Publishing to a
/// subject nobody listens on is dropped.
pub struct InProcMessageBus {
    routes: RwLock<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
    shutdown: CancellationToken,
    dispatchers: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for InProcMessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subjects = self
            .routes
            .try_read()
            .map(|routes| routes.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        f.debug_struct("InProcMessageBus")
            .field("subjects", &subjects)
            .field("shutdown_cancelled", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl InProcMessageBus {
    /// Dispatch tasks stop once `shutdown` is cancelled.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            shutdown,
            dispatchers: Mutex::new(Vec::new()),
        }
    }

    pub async fn subjects(&self) -> Vec<String> {
        let routes = self.routes.read().await;
        let mut subjects: Vec<String> = routes.keys().cloned().collect();
        subjects.sort();
        subjects
    }

    /// Cancels dispatch and waits for in-flight handlers to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.routes.write().await.clear();

        let handles = {
            let mut guard = self.dispatchers.lock().await;
            std::mem::take(&mut *guard)
        };

        let joined = join_all(handles.into_iter().map(|handle| {
            tokio::time::timeout(DISPATCH_SHUTDOWN_GRACE, handle)
        }))
        .await;

        for result in joined {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(target: "bus", "dispatch task failed: {err:?}")
                }
                Err(_) => {
                    warn!(target: "bus", "dispatch task timed out during shutdown")
                }
            }
        }

        info!(target: "bus", "in-process bus shut down");
    }

    fn spawn_dispatcher(
        &self,
        subject: String,
        handler: Arc<dyn MessageHandler>,
        mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> JoinHandle<()> {
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        debug!(target: "bus", subject = %subject, "dispatcher shutting down");
                        break;
                    }
                    msg = rx.recv() => match msg {
                        Some(payload) => {
                            if let Err(err) = handler.handle(&subject, &payload).await {
                                warn!(target: "bus", subject = %subject, error = %err, "message handler failed");
                            }
                        }
                        None => break,
                    }
                }
            }
        })
    }
}

#[async_trait]
impl MessageBus for InProcMessageBus {
    async fn publish_bytes(
        &self,
        subject: &str,
        payload: Vec<u8>,
    ) -> Result<(), BusError> {
        if self.shutdown.is_cancelled() {
            return Err(BusError::Closed);
        }

        let routes = self.routes.read().await;
        match routes.get(subject) {
            Some(tx) => tx.send(payload).map_err(|_| BusError::Closed),
            None => {
                debug!(target: "bus", subject, "no subscriber - message dropped");
                Ok(())
            }
        }
    }

    async fn subscribe(
        &self,
        subject: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BusError> {
        if self.shutdown.is_cancelled() {
            return Err(BusError::Closed);
        }

        let mut routes = self.routes.write().await;
        if routes.contains_key(subject) {
            return Err(BusError::AlreadySubscribed(subject.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.spawn_dispatcher(subject.to_string(), handler, rx);
        routes.insert(subject.to_string(), tx);
        self.dispatchers.lock().await.push(handle);

        debug!(target: "bus", subject, "handler registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MessageBusExt, json_handler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn delivers_typed_payloads_in_order() {
        let bus = InProcMessageBus::new(CancellationToken::new());
        let (tx, mut rx) = unbounded_channel::<u64>();

        bus.subscribe(
            "numbers",
            json_handler(move |n: u64| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(n);
                    Ok::<(), crate::CoreError>(())
                }
            }),
        )
        .await
        .unwrap();

        for n in [1_u64, 2, 3] {
            bus.publish_json("numbers", &n).await.unwrap();
        }

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn second_subscription_is_rejected() {
        let bus = InProcMessageBus::new(CancellationToken::new());
        let noop = || {
            json_handler(|_: u64| async { Ok::<(), crate::CoreError>(()) })
        };

        bus.subscribe("a", noop()).await.unwrap();
        let err = bus.subscribe("a", noop()).await.unwrap_err();
        assert!(matches!(err, BusError::AlreadySubscribed(s) if s == "a"));
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_a_noop() {
        let bus = InProcMessageBus::new(CancellationToken::new());
        bus.publish_json("nobody", &1_u64).await.unwrap();
    }

    #[tokio::test]
    async fn undecodable_payload_does_not_reach_handler() {
        let bus = InProcMessageBus::new(CancellationToken::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = unbounded_channel::<u64>();

        let counter = Arc::clone(&calls);
        bus.subscribe(
            "numbers",
            json_handler(move |n: u64| {
                let tx = tx.clone();
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = tx.send(n);
                    Ok::<(), crate::CoreError>(())
                }
            }),
        )
        .await
        .unwrap();

        bus.publish_bytes("numbers", b"not json".to_vec())
            .await
            .unwrap();
        bus.publish_json("numbers", &7_u64).await.unwrap();

        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_bus_rejects_publishes() {
        let bus = InProcMessageBus::new(CancellationToken::new());
        bus.shutdown().await;
        let err = bus.publish_json("a", &1_u64).await.unwrap_err();
        assert!(matches!(err, BusError::Closed));
    }
}
