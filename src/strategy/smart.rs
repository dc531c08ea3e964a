use super::{CaptureRequest, Strategy, StrategyContext, Variant};
use crate::{Error, Result};
use futures::future::join_all;
use log::warn;

/// Strategies the smart capture fans out to.
pub const COMPONENTS: [Strategy; 4] = [
    Strategy::Clone,
    Strategy::PaddingExpand,
    Strategy::InPlace,
    Strategy::ColorCorrection,
];

/// Run every component concurrently and merge whatever succeeded.
///
/// Each component still goes through the render session, so the captures
/// interleave but never overlap. One failure never cancels the others; the
/// call fails only when no component produced a variant.
pub(super) async fn run(request: &CaptureRequest, ctx: &StrategyContext<'_>) -> Result<Vec<Variant>> {
    let settled = join_all(COMPONENTS.iter().map(|strategy| async move {
        (strategy, strategy.run_single(request, ctx).await)
    }))
    .await;

    let mut variants = Vec::new();
    let mut failures = Vec::new();
    for (strategy, outcome) in settled {
        match outcome {
            Ok(vs) => variants.extend(vs),
            Err(e) => failures.push(format!("{}: {}", strategy.name(), e)),
        }
    }

    if variants.is_empty() {
        return Err(Error::AggregateStrategyFailure(failures));
    }
    if !failures.is_empty() {
        warn!(
            "smart capture of {} kept {} variants despite {} failed strategies: {}",
            request.target_node_id,
            variants.len(),
            failures.len(),
            failures.join("; ")
        );
    }
    Ok(variants)
}
