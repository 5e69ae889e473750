//! Off-thread query execution.
//!
//! Queries block while operations are invoked. `QueryRuntime` runs them on a
//! bounded pool of worker threads so callers can submit, wait with a
//! deadline, or cancel.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use super::QueryEngine;
use crate::context::CancellationToken;
use crate::error::{ResolutionError, RuntimeError, WeftError, WeftResult};
use crate::instance::TypedInstance;
use crate::query::QueryResult;
use crate::types::Type;

enum Job {
    Find {
        facts: Vec<TypedInstance>,
        targets: Vec<Arc<Type>>,
        cancellation: CancellationToken,
        reply: Sender<WeftResult<QueryResult>>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(workers: usize, queue_capacity: usize, engine: &Arc<QueryEngine>) -> WeftResult<Self> {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let engine = Arc::clone(engine);
            let handle = thread::Builder::new()
                .name(format!("weftql-query-{idx}"))
                .spawn(move || loop {
                    match rx.recv() {
                        Ok(Job::Find {
                            facts,
                            targets,
                            cancellation,
                            reply,
                        }) => {
                            let result = if cancellation.is_cancelled() {
                                Err(ResolutionError::Cancelled.into())
                            } else {
                                engine.find_with_cancellation(facts, &targets, cancellation)
                            };
                            let _ = reply.send(result);
                        }
                        Err(_) => break,

                        #[cfg(test)]
                        Ok(Job::Sleep { duration, reply }) => {
                            thread::sleep(duration);
                            let _ = reply.send(());
                        }
                    }
                })
                .map_err(|e| WeftError::internal(format!("failed to spawn query worker: {e}")))?;
            handles.push(handle);
        }
        debug!(workers, queue_capacity, "query runtime started");

        Ok(Self {
            tx,
            workers: handles,
            queue_capacity,
        })
    }

    fn try_submit(&self, job: Job) -> Result<(), RuntimeError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(capacity = self.queue_capacity, "query queue full");
                Err(RuntimeError::QueueFull {
                    capacity: self.queue_capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => Err(RuntimeError::Disconnected),
        }
    }

    fn shutdown(self) {
        // Closing the channel lets workers drain queued jobs, then exit.
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

/// A submitted query.
#[derive(Debug)]
pub struct QueryHandle {
    rx: Receiver<WeftResult<QueryResult>>,
    cancellation: CancellationToken,
}

impl QueryHandle {
    /// Asks the query to stop at its next checkpoint. A query still in the
    /// queue will not start.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// The token [`cancel`](Self::cancel) fires.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Waits for the query to finish.
    pub fn join(self) -> WeftResult<QueryResult> {
        self.rx.recv().map_err(|_| WeftError::Runtime(RuntimeError::Disconnected))?
    }

    /// Waits at most `timeout` for the query to finish.
    ///
    /// The query keeps running after a timeout; cancel it if the result is
    /// no longer wanted.
    pub fn join_timeout(self, timeout: Duration) -> WeftResult<QueryResult> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => WeftError::Runtime(RuntimeError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            RecvTimeoutError::Disconnected => WeftError::Runtime(RuntimeError::Disconnected),
        })?
    }
}

/// Runs queries for one engine on a bounded worker pool.
pub struct QueryRuntime {
    engine: Arc<QueryEngine>,
    pool: WorkerPool,
}

impl QueryRuntime {
    /// Starts workers sized by the engine's runtime configuration.
    pub fn start(engine: QueryEngine) -> WeftResult<Self> {
        let engine = Arc::new(engine);
        let runtime = engine.config().runtime.clone();
        let pool = WorkerPool::start(runtime.workers, runtime.queue_capacity, &engine)?;
        Ok(Self { engine, pool })
    }

    /// Queues a query. Fails fast with `QueueFull` instead of blocking.
    pub fn submit(&self, facts: Vec<TypedInstance>, targets: Vec<Arc<Type>>) -> WeftResult<QueryHandle> {
        let (tx, rx) = bounded::<WeftResult<QueryResult>>(1);
        let cancellation = CancellationToken::new();
        self.pool.try_submit(Job::Find {
            facts,
            targets,
            cancellation: cancellation.clone(),
            reply: tx,
        })?;
        Ok(QueryHandle { rx, cancellation })
    }

    /// Queues a query and waits for it.
    pub fn find(&self, facts: Vec<TypedInstance>, targets: Vec<Arc<Type>>) -> WeftResult<QueryResult> {
        self.submit(facts, targets)?.join()
    }

    /// The engine queries run on.
    #[must_use]
    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    #[cfg(test)]
    fn submit_sleep(&self, duration: Duration) -> Result<Receiver<()>, RuntimeError> {
        let (tx, rx) = bounded::<()>(1);
        self.pool.try_submit(Job::Sleep { duration, reply: tx })?;
        Ok(rx)
    }
}

impl Drop for QueryRuntime {
    fn drop(&mut self) {
        let pool = std::mem::replace(
            &mut self.pool,
            WorkerPool {
                tx: bounded::<Job>(1).0,
                workers: Vec::new(),
                queue_capacity: 1,
            },
        );
        pool.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, RuntimeConfig};
    use crate::invoke::InMemoryInvoker;
    use crate::name::QualifiedName;
    use crate::schema::{OperationName, Schema, Service};

    fn runtime(workers: usize, queue_capacity: usize) -> QueryRuntime {
        let schema = Schema::builder()
            .add_type(Type::named("acme.OrderId").alias_for("core.Int").build().unwrap())
            .add_type(Type::named("acme.Order").attribute("id", "acme.OrderId").build().unwrap())
            .add_service(
                Service::new(QualifiedName::parse("acme.OrderService").unwrap())
                    .operation("getOrder", &["acme.OrderId"], "acme.Order")
                    .unwrap(),
            )
            .build()
            .unwrap();
        let invoker = Arc::new(InMemoryInvoker::new());
        invoker
            .respond_with_json(
                OperationName::parse("acme.OrderService@@getOrder").unwrap(),
                serde_json::json!({"id": 42}),
            )
            .unwrap();
        let config = EngineConfig {
            runtime: RuntimeConfig {
                workers,
                queue_capacity,
            },
            ..EngineConfig::default()
        };
        QueryRuntime::start(QueryEngine::new(Arc::new(schema), invoker, config).unwrap()).unwrap()
    }

    fn order_query(runtime: &QueryRuntime) -> (Vec<TypedInstance>, Vec<Arc<Type>>) {
        let engine = runtime.engine();
        let id = engine.parse_fact("acme.OrderId", &serde_json::json!(42)).unwrap();
        (vec![id], vec![engine.schema().type_by_name("acme.Order").unwrap()])
    }

    #[test]
    fn executes_queries_off_thread() {
        let runtime = runtime(2, 16);
        let (facts, targets) = order_query(&runtime);
        let result = runtime.find(facts, targets).unwrap();
        assert!(result.is_fully_resolved());
    }

    #[test]
    fn full_queue_is_reported() {
        let runtime = runtime(1, 1);
        // Occupy the worker, then fill the single queue slot.
        let busy = runtime.submit_sleep(Duration::from_millis(200)).unwrap();
        thread::sleep(Duration::from_millis(20));
        let queued = runtime.submit_sleep(Duration::from_millis(1)).unwrap();

        let (facts, targets) = order_query(&runtime);
        let err = runtime.submit(facts, targets).err().unwrap();
        assert!(matches!(err, WeftError::Runtime(RuntimeError::QueueFull { capacity: 1 })));
        assert!(err.is_retryable());

        busy.recv_timeout(Duration::from_secs(1)).unwrap();
        queued.recv_timeout(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn cancelled_before_start_does_not_run() {
        let runtime = runtime(1, 4);
        let busy = runtime.submit_sleep(Duration::from_millis(100)).unwrap();
        let (facts, targets) = order_query(&runtime);
        let handle = runtime.submit(facts, targets).unwrap();
        handle.cancel();
        assert!(handle.cancellation().is_cancelled());
        let err = handle.join_timeout(Duration::from_secs(1)).unwrap_err();
        assert!(err.is_cancelled());
        busy.recv_timeout(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn join_reports_disconnected_when_reply_sender_dropped() {
        let (tx, rx) = bounded::<WeftResult<QueryResult>>(1);
        drop(tx);
        let handle = QueryHandle {
            rx,
            cancellation: CancellationToken::new(),
        };
        let err = handle.join().unwrap_err();
        assert_eq!(err, WeftError::Runtime(RuntimeError::Disconnected));
    }

    #[test]
    fn join_timeout_reports_timeout_while_running() {
        let (_tx, rx) = bounded::<WeftResult<QueryResult>>(1);
        let handle = QueryHandle {
            rx,
            cancellation: CancellationToken::new(),
        };
        let err = handle.join_timeout(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err, WeftError::Runtime(RuntimeError::Timeout { duration_ms: 10 }));
    }
}
