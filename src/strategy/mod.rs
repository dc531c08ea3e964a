//! Capture strategies
//!
//! Every strategy follows the same protocol against the render session:
//! clean up leftovers from earlier runs, isolate the target, derive a pixel
//! clip from the returned box, capture, and always clean up again. The closed
//! set of strategies is [`Strategy`]; [`Strategy::Smart`] runs the others
//! concurrently and merges their results.

mod clone;
mod color_correction;
mod in_place;
mod smart;

pub use clone::PADDING_EXPAND_MARGIN;
pub use in_place::in_place_padding;

use crate::asset::AssetAllocator;
use crate::clip::Clip;
use crate::mutation::{Geometry, IsolationSpec, MutationRequest};
use crate::page::PageHandle;
use crate::session::{PageContext, RenderSession};
use crate::{navigation, Error, Result, Viewport};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// One capture invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub target_node_id: String,
    pub document_path: PathBuf,
    #[serde(default)]
    pub manual: ManualParams,
}

impl CaptureRequest {
    pub fn new(target_node_id: impl Into<String>, document_path: impl Into<PathBuf>) -> Self {
        Self {
            target_node_id: target_node_id.into(),
            document_path: document_path.into(),
            manual: ManualParams::default(),
        }
    }

    pub fn with_manual(mut self, manual: ManualParams) -> Self {
        self.manual = manual;
        self
    }
}

/// Operator overrides carried by a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualParams {
    /// CSS filter that replaces the computed auto filter
    pub filter: Option<String>,
    /// Extra padding for in-place captures, in CSS pixels
    pub padding: Option<f64>,
}

/// Capture hints as requested. Unset flags count as `true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureHints {
    /// Node actually isolated, when it differs from the request target
    pub source_node_id: Option<String>,
    pub hide_children: Option<bool>,
    pub hide_own_text: Option<bool>,
    pub strip_text: Option<bool>,
    pub isolate_node: Option<bool>,
}

/// Hints with every flag decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedHints {
    pub hide_children: bool,
    pub hide_own_text: bool,
    pub strip_text: bool,
    pub isolate_node: bool,
}

impl CaptureHints {
    pub fn resolve(&self) -> ResolvedHints {
        ResolvedHints {
            hide_children: self.hide_children != Some(false),
            hide_own_text: self.hide_own_text != Some(false),
            strip_text: self.strip_text != Some(false),
            isolate_node: self.isolate_node != Some(false),
        }
    }
}

/// Style tweaks selected by the bake rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureAdjustments {
    /// Capture at opacity 1; the real opacity travels in metadata
    pub full_opacity: bool,
    /// Make a thin, nearly transparent border invisible
    pub suppress_faint_border: bool,
    /// When non-empty, only these direct children stay painted
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keep_children: Vec<String>,
}

/// Per-call capture environment.
pub struct StrategyContext<'a> {
    pub session: &'a RenderSession,
    pub allocator: &'a dyn AssetAllocator,
    pub hints: CaptureHints,
    pub adjustments: CaptureAdjustments,
    pub viewport: Option<Viewport>,
    /// Isolate and measure, but write no files
    pub dry_run: bool,
}

impl<'a> StrategyContext<'a> {
    pub fn new(session: &'a RenderSession, allocator: &'a dyn AssetAllocator) -> Self {
        Self {
            session,
            allocator,
            hints: CaptureHints::default(),
            adjustments: CaptureAdjustments::default(),
            viewport: None,
            dry_run: false,
        }
    }

    pub fn with_hints(mut self, hints: CaptureHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_adjustments(mut self, adjustments: CaptureAdjustments) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn source_node<'r>(&'r self, request: &'r CaptureRequest) -> &'r str {
        self.hints.source_node_id.as_deref().unwrap_or(&request.target_node_id)
    }
}

/// One candidate image for a capture request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub name: String,
    /// Written file; `None` only for dry runs
    pub image_path: Option<PathBuf>,
    pub relative_path: Option<String>,
    pub description: String,
    pub metadata: serde_json::Value,
}

/// The closed set of capture techniques.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Isolated deep clone of the target ("Original")
    Clone,
    /// Clone isolation with the clip grown around shadows
    PaddingExpand,
    /// Live target isolated through scoped rules ("Force Context")
    InPlace,
    /// Auto-level analysis plus filtered recaptures
    ColorCorrection,
    /// All of the above, concurrently
    Smart,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Clone => "clone",
            Strategy::PaddingExpand => "padding-expand",
            Strategy::InPlace => "in-place",
            Strategy::ColorCorrection => "color-correction",
            Strategy::Smart => "smart",
        }
    }

    /// Run the strategy and return its variants.
    pub async fn run(&self, request: &CaptureRequest, ctx: &StrategyContext<'_>) -> Result<Vec<Variant>> {
        match self {
            Strategy::Smart => smart::run(request, ctx).await,
            single => single.run_single(request, ctx).await,
        }
    }

    async fn run_single(&self, request: &CaptureRequest, ctx: &StrategyContext<'_>) -> Result<Vec<Variant>> {
        if request.target_node_id.is_empty() {
            return Err(Error::InvalidArgument("capture request has no target node".into()));
        }
        let variants = match self {
            Strategy::Clone => vec![clone::run(request, ctx, false).await?],
            Strategy::PaddingExpand => vec![clone::run(request, ctx, true).await?],
            Strategy::InPlace => vec![in_place::run(request, ctx).await?],
            Strategy::ColorCorrection => color_correction::run(request, ctx).await?,
            Strategy::Smart => {
                return Err(Error::InvalidArgument("smart strategy cannot run as a single capture".into()))
            }
        };
        for v in &variants {
            info!("{} produced variant {}", self.name(), v.id);
        }
        Ok(variants)
    }
}

/// How the target is isolated before capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Isolation {
    Clone,
    InPlace,
}

/// Run `body` with the target isolated, cleaning up on every exit path.
async fn run_isolated<T, F, Fut>(
    request: &CaptureRequest,
    ctx: &StrategyContext<'_>,
    isolation: Isolation,
    body: F,
) -> Result<T>
where
    F: FnOnce(PageHandle, PageContext, Geometry) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let node_id = ctx.source_node(request).to_string();
    let spec = IsolationSpec::new(&node_id, &ctx.hints.resolve(), &ctx.adjustments);
    let mutation = match isolation {
        Isolation::Clone => MutationRequest::IsolateClone(spec),
        Isolation::InPlace => MutationRequest::IsolateInPlace(spec),
    };
    let settle = Duration::from_millis(ctx.session.options().settle_timeout_ms);

    ctx.session
        .execute(&request.document_path, ctx.viewport, |page, page_ctx| async move {
            if !page_ctx.reused {
                navigation::wait_for_settle(&page, settle).await?;
            }
            // A previous capture may have died before its own cleanup.
            page.mutate(MutationRequest::Cleanup).await?;

            let outcome = async {
                let reply = page.mutate(mutation).await?;
                let geometry = Geometry::from_reply(&node_id, reply)?;
                body(page.clone(), page_ctx, geometry).await
            }
            .await;

            // Not a drop guard: if this future is dropped mid-capture, its
            // artifacts stay until the next capture's leading cleanup above.
            let cleanup = page.mutate(MutationRequest::Cleanup).await;
            match (outcome, cleanup) {
                (Ok(value), Ok(_)) => Ok(value),
                (Ok(value), Err(e)) => {
                    warn!("cleanup after capturing {} failed: {}", node_id, e);
                    Ok(value)
                }
                (Err(e), Ok(_)) => Err(e),
                (Err(e), Err(cleanup_err)) => {
                    warn!("cleanup after failed capture of {} failed: {}", node_id, cleanup_err);
                    Err(e)
                }
            }
        })
        .await
}

/// Clip around a rendered box grown by `padding`.
fn clip_for(node_id: &str, geometry: &Geometry, padding: f64) -> Result<Clip> {
    let dims = [geometry.x, geometry.y, geometry.width, geometry.height];
    if dims.iter().any(|d| !d.is_finite()) {
        return Err(Error::InvalidClip(format!("{} reported a non-finite box", node_id)));
    }
    if geometry.width <= 0.0 || geometry.height <= 0.0 {
        return Err(Error::NotFound(format!(
            "{} has a zero-area box ({}x{})",
            node_id, geometry.width, geometry.height
        )));
    }
    Clip::padded(geometry.x, geometry.y, geometry.width, geometry.height, padding)
        .ok_or_else(|| Error::InvalidClip(format!("{} produced a degenerate clip", node_id)))
}

/// A written (or, in dry runs, planned) capture.
struct Shot {
    image_path: Option<PathBuf>,
    relative_path: Option<String>,
    sha256: Option<String>,
}

/// Capture `clip` into the allocator's path for `suffix`.
async fn shoot(
    page: &PageHandle,
    ctx: &StrategyContext<'_>,
    request: &CaptureRequest,
    suffix: &str,
    clip: Clip,
) -> Result<Shot> {
    let asset = ctx.allocator.allocate(&request.target_node_id, suffix);
    if ctx.dry_run {
        return Ok(Shot {
            image_path: None,
            relative_path: Some(asset.relative),
            sha256: None,
        });
    }
    let bytes = page.capture_to(clip, asset.absolute.clone()).await?;
    Ok(Shot {
        image_path: Some(asset.absolute),
        relative_path: Some(asset.relative),
        sha256: Some(hex::encode(Sha256::digest(&bytes))),
    })
}

fn variant(request: &CaptureRequest, suffix: &str, name: &str, description: String, shot: Shot, mut metadata: serde_json::Value) -> Variant {
    if let Some(map) = metadata.as_object_mut() {
        map.insert("sha256".into(), shot.sha256.into());
        map.insert("dryRun".into(), shot.image_path.is_none().into());
    }
    Variant {
        id: format!("{}-{}", request.target_node_id, suffix),
        name: name.to_string(),
        image_path: shot.image_path,
        relative_path: shot.relative_path,
        description,
        metadata,
    }
}
