//! Shadow and blur extents from computed CSS values
//!
//! In-place captures keep the node in its real context, so anything it paints
//! outside its border box (box/text shadows, drop-shadow and blur filters)
//! must be covered by extra clip padding.

/// Extra pixels needed on each side to contain a node's shadows and blurs.
pub fn shadow_padding(box_shadow: Option<&str>, text_shadow: Option<&str>, filter: Option<&str>) -> f64 {
    let extent = [
        box_shadow.map(shadow_list_extent),
        text_shadow.map(shadow_list_extent),
        filter.map(filter_extent),
    ]
    .into_iter()
    .flatten()
    .fold(0.0_f64, f64::max);
    extent.ceil()
}

/// Largest extent over a comma-separated `box-shadow`/`text-shadow` value.
pub fn shadow_list_extent(value: &str) -> f64 {
    split_top_level(value, ',')
        .iter()
        .map(|shadow| single_shadow_extent(shadow))
        .fold(0.0, f64::max)
}

/// Extent of a `filter` value: `drop-shadow()` behaves like a shadow without
/// spread, `blur()` spreads twice its radius.
pub fn filter_extent(value: &str) -> f64 {
    let mut extent = 0.0_f64;
    for (name, args) in functions(value) {
        match name.as_str() {
            "drop-shadow" => extent = extent.max(single_shadow_extent(&args)),
            "blur" => {
                let radius = lengths(&args).first().copied().unwrap_or(0.0);
                extent = extent.max(radius.abs() * 2.0);
            }
            _ => {}
        }
    }
    extent
}

fn single_shadow_extent(shadow: &str) -> f64 {
    let trimmed = shadow.trim();
    if trimmed.is_empty() || trimmed == "none" {
        return 0.0;
    }
    if trimmed.split_whitespace().any(|t| t == "inset") {
        return 0.0;
    }
    let values = lengths(&strip_functions(trimmed));
    let offset_x = values.first().copied().unwrap_or(0.0);
    let offset_y = values.get(1).copied().unwrap_or(0.0);
    let blur = values.get(2).copied().unwrap_or(0.0).max(0.0);
    let spread = values.get(3).copied().unwrap_or(0.0).max(0.0);
    offset_x.abs().max(offset_y.abs()) + spread + blur * 2.0
}

/// Numeric lengths in order of appearance (`px` or unitless zero).
fn lengths(value: &str) -> Vec<f64> {
    value
        .split_whitespace()
        .filter_map(|token| {
            let number = token.strip_suffix("px").unwrap_or(token);
            number.parse::<f64>().ok().filter(|n| n.is_finite())
        })
        .collect()
}

/// Remove color functions such as `rgba(0, 0, 0, 0.4)` so their numbers are
/// not mistaken for lengths.
fn strip_functions(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    for ch in value.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    out.push(' ');
                }
            }
            _ if depth > 0 => {}
            _ => out.push(ch),
        }
    }
    // Drop the function names left dangling before their removed arguments.
    out.split_whitespace()
        .filter(|t| !matches!(*t, "rgb" | "rgba" | "hsl" | "hsla" | "color"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_top_level(value: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in value.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    parts.push(current);
    parts
}

/// `name(args)` pairs at the top level of a filter list.
fn functions(value: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut name = String::new();
    let mut args = String::new();
    let mut depth = 0usize;
    for ch in value.chars() {
        match ch {
            '(' => {
                if depth > 0 {
                    args.push(ch);
                }
                depth += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    out.push((name.trim().to_ascii_lowercase(), std::mem::take(&mut args)));
                    name.clear();
                } else {
                    args.push(ch);
                }
            }
            _ if depth > 0 => args.push(ch),
            c if c.is_whitespace() => name.clear(),
            _ => name.push(ch),
        }
    }
    out
}
