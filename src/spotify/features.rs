use futures::future::join_all;
use serde_json::Value;

use crate::spotify::{endpoints::Endpoints, gate::RequestGate};

/// Upstream ceiling on ids per `/audio-features` request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Resolves audio features for a deduplicated list of track ids.
///
/// Ids are split into batches of at most `batch_size` and every batch is one
/// gated request; batches run concurrently under the gate's bound. A batch
/// that fails or lacks the `audio_features` array is logged and skipped.
/// Null entries (tracks without features, such as local files) are dropped.
pub async fn fetch_features(
    gate: &RequestGate,
    endpoints: &Endpoints,
    token: &str,
    track_ids: &[String],
    batch_size: usize,
) -> Vec<Value> {
    if track_ids.is_empty() {
        return Vec::new();
    }

    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let requests = track_ids.chunks(batch_size).map(|batch| async move {
        let url = endpoints.audio_features(batch);
        match gate.request(&url, token).await {
            Ok(mut body) => match body.get_mut("audio_features").map(Value::take) {
                Some(Value::Array(features)) => features,
                _ => {
                    tracing::warn!(
                        url = %url,
                        batch = batch.len(),
                        "response has no audio_features array, skipping batch"
                    );
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::warn!(batch = batch.len(), error = %e, "audio feature batch failed, skipping");
                Vec::new()
            }
        }
    });

    let features: Vec<Value> = join_all(requests)
        .await
        .into_iter()
        .flatten()
        .filter(|feature| !feature.is_null())
        .collect();

    tracing::debug!(
        requested = track_ids.len(),
        resolved = features.len(),
        "audio features fetched"
    );
    features
}
