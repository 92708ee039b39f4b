use super::config::AuditPolicy;
use crate::domain::audit::AuditEntry;
use crate::domain::page::{Page, PageRequest};
use crate::domain::ports::AuditStoreRef;
use crate::error::Result;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

const MAX_DELIVERY_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(20);

enum Outbound {
    Entry(AuditEntry),
    Flush(oneshot::Sender<()>),
}

/// Append-only sink for audit entries.
///
/// Callers hand it an entry only after their own state change is durable.
/// Under [`AuditPolicy::Deferred`] entries are queued to a background worker
/// that retries each append with backoff; every other policy appends inline.
/// Clones share the same queue.
#[derive(Clone)]
pub struct AuditRecorder {
    store: AuditStoreRef,
    policy: AuditPolicy,
    outbox: Option<mpsc::UnboundedSender<Outbound>>,
}

impl AuditRecorder {
    /// Must be called inside a Tokio runtime for the deferred policy to get
    /// its worker. Without one it degrades to best-effort inline appends.
    pub fn new(store: AuditStoreRef, policy: AuditPolicy) -> Self {
        let mut policy = policy;
        let outbox = match policy {
            AuditPolicy::Deferred => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    handle.spawn(deliver(store.clone(), rx));
                    Some(tx)
                }
                Err(_) => {
                    warn!("no async runtime for deferred audit delivery, appending inline");
                    policy = AuditPolicy::BestEffort;
                    None
                }
            },
            _ => None,
        };
        Self {
            store,
            policy,
            outbox,
        }
    }

    pub fn policy(&self) -> AuditPolicy {
        self.policy
    }

    pub async fn record(&self, entry: AuditEntry) -> Result<()> {
        if let Some(outbox) = &self.outbox {
            return match outbox.send(Outbound::Entry(entry)) {
                Ok(()) => Ok(()),
                Err(mpsc::error::SendError(Outbound::Entry(entry))) => {
                    warn!(entity_id = %entry.entity_id, "audit worker gone, appending inline");
                    self.append_inline(entry).await
                }
                Err(_) => Ok(()),
            };
        }
        self.append_inline(entry).await
    }

    /// Waits until every entry queued before this call has been handled by
    /// the deferred worker. Returns immediately for inline policies.
    pub async fn flush(&self) {
        let Some(outbox) = &self.outbox else {
            return;
        };
        let (ack, done) = oneshot::channel();
        if outbox.send(Outbound::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    pub async fn entries(&self, page: PageRequest) -> Result<Page<AuditEntry>> {
        self.store.list(page).await
    }

    async fn append_inline(&self, entry: AuditEntry) -> Result<()> {
        let action = entry.action;
        let entity_id = entry.entity_id.clone();

        match self.store.append(entry).await {
            Ok(()) => Ok(()),
            Err(e) if self.policy == AuditPolicy::Strict => Err(e),
            Err(e) => {
                error!(?action, %entity_id, error = %e, "failed to append audit entry");
                Ok(())
            }
        }
    }
}

async fn deliver(store: AuditStoreRef, mut inbox: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(message) = inbox.recv().await {
        match message {
            Outbound::Entry(entry) => append_with_retry(&store, entry).await,
            Outbound::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

async fn append_with_retry(store: &AuditStoreRef, entry: AuditEntry) {
    let mut backoff = INITIAL_BACKOFF;
    for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
        match store.append(entry.clone()).await {
            Ok(()) => return,
            Err(e) if attempt < MAX_DELIVERY_ATTEMPTS => {
                warn!(attempt, entity_id = %entry.entity_id, error = %e, "audit append failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => {
                error!(
                    action = ?entry.action,
                    entity_id = %entry.entity_id,
                    error = %e,
                    "audit entry dropped after retries"
                );
            }
        }
    }
}
