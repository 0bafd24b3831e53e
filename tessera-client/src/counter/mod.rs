//! The atomic counter primitive.

mod builder;
mod service;

use std::future::Future;

use anyhow::Result;

use crate::primitive::PrimitiveProxy;
use crate::proto::{CounterAddRequest, CounterCompareAndSetRequest, CounterCompareAndSetResponse, CounterSetRequest, CounterValue, Empty};
use tessera_core::{PartitionId, PrimitiveId};

pub use builder::AtomicCounterBuilder;
pub(crate) use service::CounterService;

/// The primitive type name of atomic counters.
pub const ATOMIC_COUNTER: &str = "atomic-counter";

pub(crate) const OP_GET: &str = "get";
pub(crate) const OP_SET: &str = "set";
pub(crate) const OP_COMPARE_AND_SET: &str = "compare-and-set";
pub(crate) const OP_ADD_AND_GET: &str = "add-and-get";
pub(crate) const OP_GET_AND_ADD: &str = "get-and-add";

/// A distributed atomic counter.
///
/// Every operation is issued when its method is called, and operation results are delivered
/// in issue order.
#[derive(Clone)]
pub struct AsyncAtomicCounter {
    proxy: PrimitiveProxy,
}

impl AsyncAtomicCounter {
    pub(crate) fn new(proxy: PrimitiveProxy) -> Self {
        Self { proxy }
    }

    /// The ID of this counter.
    pub fn id(&self) -> &PrimitiveId {
        self.proxy.id()
    }

    /// The name of this counter.
    pub fn name(&self) -> &str {
        self.proxy.id().name()
    }

    /// The partition this counter is bound to.
    pub fn partition_id(&self) -> &PartitionId {
        self.proxy.partition_id()
    }

    /// The underlying primitive proxy.
    pub fn proxy(&self) -> &PrimitiveProxy {
        &self.proxy
    }

    /// Get the current value.
    pub fn get(&self) -> impl Future<Output = Result<i64>> + Send + 'static {
        let res = self.proxy.invoke::<_, CounterValue>(OP_GET, &Empty {});
        async move { Ok(res.await?.value) }
    }

    /// Set the value.
    pub fn set(&self, value: i64) -> impl Future<Output = Result<()>> + Send + 'static {
        let res = self.proxy.invoke::<_, Empty>(OP_SET, &CounterSetRequest { value });
        async move {
            res.await?;
            Ok(())
        }
    }

    /// Set the value to `update` only if it currently equals `expect`.
    ///
    /// Returns `true` if the value was updated.
    pub fn compare_and_set(&self, expect: i64, update: i64) -> impl Future<Output = Result<bool>> + Send + 'static {
        let res = self
            .proxy
            .invoke::<_, CounterCompareAndSetResponse>(OP_COMPARE_AND_SET, &CounterCompareAndSetRequest { expect, update });
        async move { Ok(res.await?.succeeded) }
    }

    /// Add `delta` to the value, returning the updated value.
    pub fn add_and_get(&self, delta: i64) -> impl Future<Output = Result<i64>> + Send + 'static {
        let res = self.proxy.invoke::<_, CounterValue>(OP_ADD_AND_GET, &CounterAddRequest { delta });
        async move { Ok(res.await?.value) }
    }

    /// Add `delta` to the value, returning the previous value.
    pub fn get_and_add(&self, delta: i64) -> impl Future<Output = Result<i64>> + Send + 'static {
        let res = self.proxy.invoke::<_, CounterValue>(OP_GET_AND_ADD, &CounterAddRequest { delta });
        async move { Ok(res.await?.value) }
    }

    /// Increment the value, returning the updated value.
    pub fn increment_and_get(&self) -> impl Future<Output = Result<i64>> + Send + 'static {
        self.add_and_get(1)
    }

    /// Decrement the value, returning the updated value.
    pub fn decrement_and_get(&self) -> impl Future<Output = Result<i64>> + Send + 'static {
        self.add_and_get(-1)
    }

    /// Increment the value, returning the previous value.
    pub fn get_and_increment(&self) -> impl Future<Output = Result<i64>> + Send + 'static {
        self.get_and_add(1)
    }

    /// Decrement the value, returning the previous value.
    pub fn get_and_decrement(&self) -> impl Future<Output = Result<i64>> + Send + 'static {
        self.get_and_add(-1)
    }

    /// Close this counter, releasing its session & execution context.
    pub async fn close(&self) -> Result<()> {
        self.proxy.close().await
    }

    /// A blocking facade over this counter.
    pub fn sync(self) -> AtomicCounter {
        AtomicCounter { counter: self }
    }
}

/// A blocking facade over an [`AsyncAtomicCounter`].
///
/// Each call blocks the current thread until the operation's result is delivered. Calling
/// these methods from within an asynchronous execution context panics; use
/// `tokio::task::spawn_blocking` or a plain thread instead.
#[derive(Clone)]
pub struct AtomicCounter {
    counter: AsyncAtomicCounter,
}

impl AtomicCounter {
    fn block_on<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        self.counter.proxy.context().runtime().block_on(fut)
    }

    /// The name of this counter.
    pub fn name(&self) -> &str {
        self.counter.name()
    }

    /// The partition this counter is bound to.
    pub fn partition_id(&self) -> &PartitionId {
        self.counter.partition_id()
    }

    pub fn get(&self) -> Result<i64> {
        self.block_on(self.counter.get())
    }

    pub fn set(&self, value: i64) -> Result<()> {
        self.block_on(self.counter.set(value))
    }

    pub fn compare_and_set(&self, expect: i64, update: i64) -> Result<bool> {
        self.block_on(self.counter.compare_and_set(expect, update))
    }

    pub fn add_and_get(&self, delta: i64) -> Result<i64> {
        self.block_on(self.counter.add_and_get(delta))
    }

    pub fn get_and_add(&self, delta: i64) -> Result<i64> {
        self.block_on(self.counter.get_and_add(delta))
    }

    pub fn increment_and_get(&self) -> Result<i64> {
        self.block_on(self.counter.increment_and_get())
    }

    pub fn decrement_and_get(&self) -> Result<i64> {
        self.block_on(self.counter.decrement_and_get())
    }

    pub fn get_and_increment(&self) -> Result<i64> {
        self.block_on(self.counter.get_and_increment())
    }

    pub fn get_and_decrement(&self) -> Result<i64> {
        self.block_on(self.counter.get_and_decrement())
    }

    pub fn close(&self) -> Result<()> {
        self.block_on(self.counter.close())
    }

    /// The asynchronous counter behind this facade.
    pub fn async_counter(&self) -> &AsyncAtomicCounter {
        &self.counter
    }
}
