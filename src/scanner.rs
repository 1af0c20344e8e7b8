use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::observer::ScanObserver;
use crate::probe::{PortProbe, Probe};
use crate::services::ServiceNameResolver;
use crate::types::{PortResult, ProbeTask, ScanRequest};

/// How a scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every task was collected. Results are sorted by port, TCP before UDP.
    Completed(Vec<PortResult>),
    /// `cancel()` was observed before collection finished. `on_complete` was not called.
    Cancelled,
}

/// Cloneable, thread-safe way to cancel a running scan from elsewhere.
#[derive(Debug, Clone)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Runs probes over a port range with a bounded number in flight, streaming
/// progress and results to a [`ScanObserver`].
///
/// One coordinator runs at most one scan at a time; calling [`scan`](Self::scan)
/// concurrently on the same instance is unsupported. Cancellation is permanent:
/// once [`cancel`](Self::cancel) has been called, every later scan on this
/// instance returns [`ScanOutcome::Cancelled`] without probing anything.
pub struct ScanCoordinator<P: Probe = PortProbe> {
    probe: Arc<P>,
    config: ScanConfig,
    cancel: CancellationToken,
}

impl ScanCoordinator<PortProbe> {
    pub fn new(config: ScanConfig) -> Self {
        Self::with_probe(PortProbe::new(config, ServiceNameResolver::system()), config)
    }
}

impl Default for ScanCoordinator<PortProbe> {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl<P: Probe> ScanCoordinator<P> {
    pub fn with_probe(probe: P, config: ScanConfig) -> Self {
        Self {
            probe: Arc::new(probe),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop submitting probes and stop waiting for their outcomes.
    ///
    /// Idempotent. Probes already in flight are not interrupted; they run to
    /// their own timeout during pool shutdown and their outcomes are discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancel.clone())
    }

    /// Scan `request`, reporting to `observer` as probes complete.
    ///
    /// The host is resolved once, bounded by the configured resolve timeout,
    /// and every probe targets that address. A host that does not resolve fails
    /// with [`ScanError::UnresolvedHost`] before any callback fires.
    ///
    /// Callbacks are invoked from this future only, one at a time, in completion
    /// order. The worker pool is drained (bounded by the configured grace period)
    /// before this returns; dropping the future aborts every in-flight probe.
    pub async fn scan<O: ScanObserver>(
        &self,
        request: &ScanRequest,
        mut observer: O,
    ) -> Result<ScanOutcome, ScanError> {
        request.validate()?;
        let addr = resolve_host(&request.host, self.config.resolve_timeout).await?;

        let total = request.total_tasks();
        let sem = Arc::new(Semaphore::new(request.concurrency));
        let mut set: JoinSet<(ProbeTask, Option<PortResult>)> = JoinSet::new();
        let mut in_flight: HashMap<Id, ProbeTask> = HashMap::new();
        let mut pending = request.tasks().peekable();
        let mut completed: u64 = 0;
        let mut results: Vec<PortResult> = Vec::new();
        let started = Instant::now();

        info!(
            host = %request.host,
            %addr,
            start = request.start_port,
            end = request.end_port,
            protocol = %request.protocol,
            concurrency = request.concurrency,
            total,
            "scan started"
        );

        loop {
            if pending.peek().is_none() && set.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!(completed, in_flight = set.len(), "cancellation observed");
                    break;
                }

                Some(joined) = set.join_next_with_id(), if !set.is_empty() => {
                    completed += 1;
                    let percentage = completed as f64 * 100.0 / total as f64;
                    match joined {
                        Ok((id, (task, outcome))) => {
                            in_flight.remove(&id);
                            observer.on_progress(task.port, percentage);
                            if let Some(result) = outcome {
                                debug!(port = result.port, protocol = %result.protocol, state = %result.state, "port found");
                                observer.on_result(&result);
                                results.push(result);
                            }
                        }
                        Err(e) => {
                            let task = in_flight.remove(&e.id());
                            let port = task.map(|t| t.port).unwrap_or_default();
                            let message = match task {
                                Some(t) => format!("probe of {} port {} failed: {e}", t.protocol, t.port),
                                None => format!("probe task failed: {e}"),
                            };
                            warn!("{message}");
                            observer.on_progress(port, percentage);
                            observer.on_error(&message);
                        }
                    }
                }

                permit = sem.clone().acquire_owned(), if pending.peek().is_some() => {
                    let Ok(permit) = permit else {
                        break;
                    };
                    let Some(task) = pending.next() else {
                        continue;
                    };
                    let probe = self.probe.clone();
                    let handle = set.spawn(async move {
                        let _permit = permit; // keep permit until the probe finishes
                        let outcome = probe.probe(addr, task).await;
                        (task, outcome)
                    });
                    in_flight.insert(handle.id(), task);
                }
            }
        }

        shutdown_pool(&mut set, self.config.shutdown_grace).await;

        results.sort_by_key(|r| (r.port, r.protocol));

        if self.cancel.is_cancelled() {
            info!(
                completed,
                total,
                open = results.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "scan cancelled"
            );
            return Ok(ScanOutcome::Cancelled);
        }

        info!(
            total,
            open = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan complete"
        );
        observer.on_complete(&results);
        Ok(ScanOutcome::Completed(results))
    }
}

/// Resolve `host` to a single address. IP literals skip the lookup.
async fn resolve_host(host: &str, limit: Duration) -> Result<IpAddr, ScanError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let unresolved = |reason: String| ScanError::UnresolvedHost {
        host: host.to_owned(),
        reason,
    };
    match time::timeout(limit, tokio::net::lookup_host((host, 0))).await {
        Ok(Ok(mut addrs)) => addrs
            .next()
            .map(|a| a.ip())
            .ok_or_else(|| unresolved("no addresses returned".into())),
        Ok(Err(e)) => Err(unresolved(e.to_string())),
        Err(_) => Err(unresolved(format!(
            "lookup timed out after {} ms",
            limit.as_millis()
        ))),
    }
}

/// Let in-flight probes finish for up to `grace`, then abort whatever is left.
async fn shutdown_pool<T: 'static>(set: &mut JoinSet<T>, grace: Duration) {
    if set.is_empty() {
        return;
    }
    debug!(in_flight = set.len(), "draining worker pool");
    let drained = time::timeout(grace, async {
        while set.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            remaining = set.len(),
            grace_ms = grace.as_millis() as u64,
            "grace period elapsed, aborting remaining probes"
        );
        set.shutdown().await;
    }
}
