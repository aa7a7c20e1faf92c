// ── Device state fetcher ──
//
// Reads live configuration through `DeviceProtocol::fetch`, retrying
// transient failures with backoff, and assembles it into a validated
// snapshot. The device driver has already normalized wire formats; this
// layer only checks that what came back is internally consistent.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::device::DeviceProtocol;
use crate::error::FetchError;
use crate::event::{EventSink, ReconcileEvent};
use crate::model::{ConfigSnapshot, EntityKind, SnapshotOrigin};
use crate::retry::RetryPolicy;

/// Fetch the live snapshot of `kinds` from `device`.
///
/// Cancellation is honoured before each attempt and during backoff, never
/// in the middle of a request.
pub async fn fetch_live(
    device: &mut dyn DeviceProtocol,
    kinds: &[EntityKind],
    policy: &RetryPolicy,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> Result<ConfigSnapshot, FetchError> {
    let name = device.name().to_owned();
    let mut attempt: u32 = 0;

    let entities = loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled { device: name });
        }
        attempt += 1;

        match device.fetch(kinds).await {
            Ok(entities) => break entities,
            Err(err) if policy.should_retry(attempt, &err) => {
                let delay = policy.backoff(attempt - 1);
                sink.emit(&ReconcileEvent::FetchRetrying {
                    device: name.clone(),
                    attempt,
                    reason: err.to_string(),
                });
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(FetchError::Cancelled { device: name }),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Err(source) => {
                return Err(FetchError::Device {
                    device: name,
                    attempts: attempt,
                    source,
                });
            }
        }
    };

    debug!(device = %name, entities = entities.len(), attempts = attempt, "live state fetched");
    ConfigSnapshot::build(&name, SnapshotOrigin::Live, entities)
        .map_err(|source| FetchError::Inconsistent { device: name, source })
}
