use super::{clip_for, run_isolated, shoot, variant, CaptureRequest, Isolation, StrategyContext, Variant};
use crate::mutation::Geometry;
use crate::shadow::shadow_padding;
use crate::Result;
use serde_json::json;

/// Clip padding for an in-place capture: the node's shadow/blur extents, or
/// the manual padding when that is larger.
pub fn in_place_padding(geometry: &Geometry, manual: Option<f64>) -> f64 {
    let auto = shadow_padding(
        geometry.box_shadow.as_deref(),
        geometry.text_shadow.as_deref(),
        geometry.filter.as_deref(),
    );
    match manual {
        Some(m) if m.is_finite() => auto.max(m),
        _ => auto,
    }
}

/// Capture the live target in context ("Force Context").
pub(super) async fn run(request: &CaptureRequest, ctx: &StrategyContext<'_>) -> Result<Variant> {
    let node_id = ctx.source_node(request).to_string();
    let hints = ctx.hints.resolve();

    run_isolated(request, ctx, Isolation::InPlace, |page, _, geometry| async move {
        let padding = in_place_padding(&geometry, request.manual.padding);
        let clip = clip_for(&node_id, &geometry, padding)?;
        let shot = shoot(&page, ctx, request, "context", clip).await?;

        let metadata = json!({
            "technique": "in-place",
            "sourceNodeId": node_id,
            "clip": clip,
            "padding": padding,
            "manualPadding": request.manual.padding,
            "hints": hints,
            "adjustments": ctx.adjustments,
        });
        let description = format!("{} captured in place, keeping shadows and blending with its context", node_id);
        Ok(variant(request, "context", "Force Context", description, shot, metadata))
    })
    .await
}
