//! Per-service long-poll watcher task.
//!
//! Each watched service name owns exactly one of these tasks. The loop is:
//! blocking read against the catalog, publish the decoded nodes wholesale,
//! repeat. The blocking call itself provides pacing on the happy path; only
//! the error path sleeps before retrying.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::constants::POLL_ERROR_RETRY_DELAY_MS;
use crate::metrics::SERVICE_WATCHERS_ACTIVE;
use crate::metrics::SERVICE_WATCHERS_CREATED;
use crate::CatalogClient;
use crate::ChangeIndex;
use crate::ServiceNode;

/// Table entry for one running (or stopping, not yet confirmed stopped)
/// service watcher.
pub(crate) struct ServiceState {
    /// Published node list; replaced wholesale on every change so readers
    /// never observe a partially updated value.
    pub(crate) nodes: Arc<ArcSwap<Vec<ServiceNode>>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) handle: JoinHandle<()>,
}

/// Starts the watcher task for `service`.
///
/// The returned receiver resolves once the first poll iteration has finished
/// (successfully or not), so the caller can treat the service as populated
/// before completing its reconcile cycle. If the watcher is cancelled before
/// its first iteration completes, the sender side is dropped and the
/// receiver resolves with an error instead; callers only care about
/// completion, not the payload.
pub(crate) fn spawn_service_watcher(
    service: String,
    client: Arc<dyn CatalogClient>,
    cancel: CancellationToken,
) -> (ServiceState, oneshot::Receiver<()>) {
    let nodes: Arc<ArcSwap<Vec<ServiceNode>>> = Arc::new(ArcSwap::from_pointee(Vec::new()));
    let (init_tx, init_rx) = oneshot::channel();

    SERVICE_WATCHERS_CREATED.inc();
    let handle = tokio::spawn(run_watch_loop(
        service,
        client,
        nodes.clone(),
        cancel.clone(),
        init_tx,
    ));

    (
        ServiceState {
            nodes,
            cancel,
            handle,
        },
        init_rx,
    )
}

async fn run_watch_loop(
    service: String,
    client: Arc<dyn CatalogClient>,
    nodes: Arc<ArcSwap<Vec<ServiceNode>>>,
    cancel: CancellationToken,
    init_tx: oneshot::Sender<()>,
) {
    SERVICE_WATCHERS_ACTIVE.inc();

    let mut last_index = ChangeIndex::ZERO;
    let mut init_tx = Some(init_tx);
    loop {
        // Cancellation drops the in-flight request future, so teardown
        // latency is bounded by request-abort latency rather than by the
        // server-side long-poll wait.
        let poll_failed = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            failed = poll_once(&service, client.as_ref(), &nodes, &mut last_index) => failed,
        };

        if let Some(tx) = init_tx.take() {
            let _ = tx.send(());
        }

        if poll_failed {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(Duration::from_millis(POLL_ERROR_RETRY_DELAY_MS)) => {}
            }
        }
    }

    SERVICE_WATCHERS_ACTIVE.dec();
}

/// One long-poll iteration. Returns true if the poll failed and the loop
/// should back off before retrying.
async fn poll_once(
    service: &str,
    client: &dyn CatalogClient,
    nodes: &ArcSwap<Vec<ServiceNode>>,
    last_index: &mut ChangeIndex,
) -> bool {
    match client.watch_service_nodes(service, *last_index).await {
        Ok(update) => {
            if update.index != *last_index {
                nodes.store(Arc::new(update.nodes));
                *last_index = update.index;
            }
            false
        }
        Err(err) => {
            error!(
                "cannot obtain nodes for service={} from {}: {}",
                service,
                client.api_server(),
                err
            );
            true
        }
    }
}
