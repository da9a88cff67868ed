//! Store double that injects failures on top of [`MemoryStore`]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::*;

/// Failure a [`FaultyStore`] reports instead of running a transaction
#[derive(Debug, Clone)]
pub enum Fault {
    Cancel(Option<Vec<CancellationReason>>),
    Timeout,
    Server(u16),
}

impl Fault {
    fn to_error(&self) -> KvError {
        match self {
            Fault::Cancel(reasons) => KvError::TransactionCanceled {
                reasons: reasons.clone(),
            },
            Fault::Timeout => KvError::Timeout,
            Fault::Server(status) => KvError::Server {
                status: *status,
                message: "injected".to_string(),
            },
        }
    }
}

#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    transact_fault: Mutex<Option<Fault>>,
    failing_puts: Mutex<Vec<String>>,
    yield_before_writes: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Every later transaction fails with `fault` and writes nothing
    pub fn fail_transactions(&self, fault: Fault) {
        *self.transact_fault.lock().unwrap() = Some(fault);
    }

    /// Every later put to `table` fails
    pub fn fail_puts_to(&self, table: &str) {
        self.failing_puts.lock().unwrap().push(table.to_string());
    }

    /// Suspend once before every update and transaction, so concurrent
    /// callers both finish their reads before either one writes
    pub fn interleave_writes(&self) {
        self.yield_before_writes.store(true, Ordering::SeqCst);
    }

    async fn maybe_yield(&self) {
        if self.yield_before_writes.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl KvStore for FaultyStore {
    async fn get_item(&self, table: &str, key: &Key) -> Result<Option<Item>, KvError> {
        self.inner.get_item(table, key).await
    }

    async fn put_item(
        &self,
        table: &str,
        key: &Key,
        item: Item,
        condition: Option<Condition>,
    ) -> Result<(), KvError> {
        if self.failing_puts.lock().unwrap().iter().any(|t| t == table) {
            return Err(Fault::Server(500).to_error());
        }
        self.inner.put_item(table, key, item, condition).await
    }

    async fn update_item(&self, request: UpdateRequest) -> Result<Item, KvError> {
        self.maybe_yield().await;
        self.inner.update_item(request).await
    }

    async fn delete_item(
        &self,
        table: &str,
        key: &Key,
        condition: Option<Condition>,
    ) -> Result<(), KvError> {
        self.inner.delete_item(table, key, condition).await
    }

    async fn transact_write(&self, items: Vec<TransactItem>) -> Result<(), KvError> {
        self.maybe_yield().await;
        let fault = self.transact_fault.lock().unwrap().clone();
        match fault {
            Some(fault) => Err(fault.to_error()),
            None => self.inner.transact_write(items).await,
        }
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, KvError> {
        self.inner.query(request).await
    }
}
