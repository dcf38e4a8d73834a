use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;
use waypoint_core::CallError;

/// Races `op` against `deadline`. The op runs as its own task and reports into a
/// oneshot; if the deadline wins the task is left running and its late result is
/// dropped. It is not aborted.
pub async fn race<T, Fut>(op: Fut, deadline: Duration) -> Result<T, CallError>
where
    Fut: Future<Output = Result<T, CallError>> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let outcome = op.await;
        // a closed receiver means the deadline already won
        let _ = tx.send(outcome);
    });

    tokio::select! {
        settled = rx => match settled {
            Ok(outcome) => outcome,
            Err(_) => Err(CallError::transient("inference task ended without reporting")),
        },
        _ = tokio::time::sleep(deadline) => {
            debug!(deadline_ms = deadline.as_millis() as u64, "deadline elapsed, abandoning call");
            Err(CallError::Timeout(deadline))
        }
    }
}
