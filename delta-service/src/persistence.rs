//! Optional persistence of finished command streams to disk
//! (SPEC_FULL.md S10.5), mirroring the source's SDS command-file artifact.
//! Off by default; enabled and directed by `ServiceConfig`.

use delta_types::CommandStream;
use tokio::fs;
use tracing::warn;

/// Write one finished command stream as a JSON file under `dir`, named by
/// `plan_id`. Failures are logged and swallowed — persistence is a
/// best-effort side channel, never a reason to fail an otherwise-successful
/// plan.
pub async fn persist_plan(dir: &str, plan_id: &str, stream: &CommandStream) {
    if let Err(e) = fs::create_dir_all(dir).await {
        warn!("persistence: failed to create {dir}: {e}");
        return;
    }
    let path = format!("{dir}/{plan_id}.json");
    let json = match serde_json::to_string_pretty(stream) {
        Ok(j) => j,
        Err(e) => {
            warn!("persistence: failed to serialize plan {plan_id}: {e}");
            return;
        }
    };
    if let Err(e) = fs::write(&path, json).await {
        warn!("persistence: failed to write {path}: {e}");
    }
}
