//! Best-effort access logging.
//!
//! Audit writes for read/update/delete events must never abort the primary
//! operation that triggered them. [`AccessLogger`] attempts the ledger write
//! and, on failure, parks the asset in a bounded local queue so it can be
//! replayed once the ledger recovers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use medvault_core::{ActorId, AuditAction, DataHash, RecordId};

use crate::asset::AuditAsset;
use crate::traits::AuditLedger;

/// Default bound on the local retry queue.
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Fire-and-forget audit writer with a local retry queue.
pub struct AccessLogger<L> {
    ledger: Arc<L>,
    pending: Mutex<VecDeque<AuditAsset>>,
    capacity: usize,
}

impl<L: AuditLedger> AccessLogger<L> {
    /// Wrap a ledger with the default queue capacity.
    pub fn new(ledger: Arc<L>) -> Self {
        Self::with_capacity(ledger, DEFAULT_QUEUE_CAPACITY)
    }

    /// Wrap a ledger with an explicit queue capacity.
    pub fn with_capacity(ledger: Arc<L>, capacity: usize) -> Self {
        Self {
            ledger,
            pending: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Record an access event. Never fails the caller.
    ///
    /// Returns `true` if the write reached the ledger, `false` if it was
    /// queued for later. Access events carry the zero data hash; only
    /// `create` assets record a plaintext digest.
    pub async fn log_access(
        &self,
        record_id: RecordId,
        actor_id: ActorId,
        action: AuditAction,
    ) -> bool {
        let asset = AuditAsset::new(record_id, actor_id, action, DataHash::ZERO);

        match self.ledger.create_asset(asset.clone()).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(
                    record_id = %record_id,
                    action = %action,
                    error = %err,
                    "access log write failed, queuing for retry"
                );
                self.enqueue(asset);
                false
            }
        }
    }

    /// Replay queued writes until the queue is empty or the ledger fails
    /// again. Returns how many entries were flushed.
    pub async fn flush_pending(&self) -> usize {
        let mut flushed = 0;

        loop {
            let next = self.pending.lock().unwrap().pop_front();
            let Some(asset) = next else { break };

            match self.ledger.create_asset(asset.clone()).await {
                Ok(_) => flushed += 1,
                Err(err) => {
                    tracing::warn!(error = %err, "flush stopped, ledger still failing");
                    self.pending.lock().unwrap().push_front(asset);
                    break;
                }
            }
        }

        flushed
    }

    /// Number of queued, not-yet-flushed events.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Queue an asset, dropping the oldest entry when full.
    fn enqueue(&self, asset: AuditAsset) {
        let mut pending = self.pending.lock().unwrap();
        if pending.len() >= self.capacity {
            pending.pop_front();
            tracing::warn!("access log queue full, dropping oldest entry");
        }
        pending.push_back(asset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LedgerError, Result};
    use crate::asset::{AuditAsset, LedgerEntry, LedgerReceipt};
    use crate::memory::MemoryLedger;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Ledger that can be switched into a failing state.
    struct SwitchableLedger {
        inner: MemoryLedger,
        failing: AtomicBool,
    }

    impl SwitchableLedger {
        fn new() -> Self {
            Self {
                inner: MemoryLedger::default(),
                failing: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl AuditLedger for SwitchableLedger {
        async fn create_asset(&self, asset: AuditAsset) -> Result<LedgerReceipt> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(LedgerError::Unavailable("injected outage".into()));
            }
            self.inner.create_asset(asset).await
        }

        async fn find_by_record_id(&self, record_id: &RecordId) -> Result<Vec<LedgerEntry>> {
            self.inner.find_by_record_id(record_id).await
        }
    }

    #[tokio::test]
    async fn test_log_access_success() {
        let ledger = Arc::new(SwitchableLedger::new());
        let logger = AccessLogger::new(Arc::clone(&ledger));
        let record_id = RecordId::generate();

        assert!(
            logger
                .log_access(record_id, ActorId::from("reader"), AuditAction::Read)
                .await
        );
        assert_eq!(logger.pending_len(), 0);
        assert_eq!(ledger.find_by_record_id(&record_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_queues_instead_of_erroring() {
        let ledger = Arc::new(SwitchableLedger::new());
        ledger.set_failing(true);
        let logger = AccessLogger::new(Arc::clone(&ledger));
        let record_id = RecordId::generate();

        let ok = logger
            .log_access(record_id, ActorId::from("reader"), AuditAction::Read)
            .await;
        assert!(!ok);
        assert_eq!(logger.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_flush_after_recovery() {
        let ledger = Arc::new(SwitchableLedger::new());
        ledger.set_failing(true);
        let logger = AccessLogger::new(Arc::clone(&ledger));
        let record_id = RecordId::generate();

        logger
            .log_access(record_id, ActorId::from("a"), AuditAction::Read)
            .await;
        logger
            .log_access(record_id, ActorId::from("b"), AuditAction::Read)
            .await;
        assert_eq!(logger.pending_len(), 2);

        ledger.set_failing(false);
        assert_eq!(logger.flush_pending().await, 2);
        assert_eq!(logger.pending_len(), 0);
        assert_eq!(ledger.find_by_record_id(&record_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_flush_stops_on_failure() {
        let ledger = Arc::new(SwitchableLedger::new());
        ledger.set_failing(true);
        let logger = AccessLogger::new(Arc::clone(&ledger));

        logger
            .log_access(RecordId::generate(), ActorId::from("a"), AuditAction::Read)
            .await;
        assert_eq!(logger.flush_pending().await, 0);
        assert_eq!(logger.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_queue_bounded() {
        let ledger = Arc::new(SwitchableLedger::new());
        ledger.set_failing(true);
        let logger = AccessLogger::with_capacity(Arc::clone(&ledger), 2);

        for _ in 0..5 {
            logger
                .log_access(RecordId::generate(), ActorId::from("a"), AuditAction::Read)
                .await;
        }
        assert_eq!(logger.pending_len(), 2);
    }
}
