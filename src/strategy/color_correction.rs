use super::in_place::in_place_padding;
use super::{clip_for, run_isolated, shoot, variant, CaptureRequest, Isolation, StrategyContext, Variant};
use crate::color::{self, GAMMA_PRESET, VIVID_PRESET};
use crate::mutation::MutationRequest;
use crate::{Error, Result};
use log::debug;
use serde_json::json;

/// Analyze the isolated target, then capture it under the auto filter and the
/// two fixed presets.
pub(super) async fn run(request: &CaptureRequest, ctx: &StrategyContext<'_>) -> Result<Vec<Variant>> {
    let node_id = ctx.source_node(request).to_string();

    run_isolated(request, ctx, Isolation::InPlace, |page, _, geometry| async move {
        let padding = in_place_padding(&geometry, request.manual.padding);
        let clip = clip_for(&node_id, &geometry, padding)?;

        let stats = if ctx.dry_run {
            None
        } else {
            let unfiltered = page.capture(clip).await?;
            color::analyze_png(&unfiltered)?
        };
        let levels = color::auto_levels(stats.as_ref());
        let computed = levels.to_filter();
        let auto_filter = request.manual.filter.clone().unwrap_or_else(|| computed.clone());
        debug!("{}: luma {:?} -> {}", node_id, stats, auto_filter);

        let passes = [
            ("auto", "Auto Levels", auto_filter.clone()),
            ("gamma", "Gamma", GAMMA_PRESET.to_string()),
            ("vivid", "Vivid", VIVID_PRESET.to_string()),
        ];

        let mut variants = Vec::with_capacity(passes.len());
        for (suffix, name, filter) in passes {
            let reply = page.mutate(MutationRequest::SetFilter { filter: filter.clone() }).await?;
            if reply.get("applied") != Some(&serde_json::Value::Bool(true)) {
                return Err(Error::Render(format!("lost the focused target of {} before filtering", node_id)));
            }
            let shot = shoot(&page, ctx, request, suffix, clip).await?;

            let mut metadata = json!({
                "technique": "color-correction",
                "sourceNodeId": node_id,
                "clip": clip,
                "padding": padding,
                "filter": filter,
            });
            if suffix == "auto" {
                metadata["luma"] = json!(stats);
                metadata["levels"] = json!(levels);
                metadata["computedFilter"] = json!(computed);
                metadata["manualFilter"] = json!(request.manual.filter);
            }
            let description = format!("{} in place with filter `{}`", node_id, filter);
            variants.push(variant(request, suffix, name, description, shot, metadata));
        }
        Ok(variants)
    })
    .await
}
