use super::{clip_for, run_isolated, shoot, variant, CaptureRequest, Isolation, StrategyContext, Variant};
use crate::shadow::shadow_padding;
use crate::Result;
use serde_json::json;

/// Margin added around shadow extents by the padding-expand capture.
pub const PADDING_EXPAND_MARGIN: f64 = 8.0;

/// Capture an isolated clone of the target. With `expand`, the clip also
/// covers the clone's shadows and blurs plus a fixed margin.
pub(super) async fn run(request: &CaptureRequest, ctx: &StrategyContext<'_>, expand: bool) -> Result<Variant> {
    let node_id = ctx.source_node(request).to_string();
    let hints = ctx.hints.resolve();

    run_isolated(request, ctx, Isolation::Clone, |page, _, geometry| async move {
        let padding = if expand {
            shadow_padding(
                geometry.box_shadow.as_deref(),
                geometry.text_shadow.as_deref(),
                geometry.filter.as_deref(),
            ) + PADDING_EXPAND_MARGIN
        } else {
            0.0
        };
        let clip = clip_for(&node_id, &geometry, padding)?;
        let (suffix, name, description) = if expand {
            ("padded", "Padding Expand", format!("Isolated clone of {} with {}px of halo room", node_id, padding))
        } else {
            ("original", "Original", format!("Isolated clone of {}", node_id))
        };
        let shot = shoot(&page, ctx, request, suffix, clip).await?;

        let technique = if expand { "padding-expand" } else { "clone" };
        let metadata = json!({
            "technique": technique,
            "sourceNodeId": node_id,
            "clip": clip,
            "padding": padding,
            "hints": hints,
            "adjustments": ctx.adjustments,
        });
        Ok(variant(request, suffix, name, description, shot, metadata))
    })
    .await
}
