//! Page scripts for Chromium-family drivers
//!
//! Each [`MutationRequest`] maps to one self-contained script. Parameters are
//! substituted as a JSON literal so node ids and filter strings never need
//! manual escaping inside the template.

use crate::mutation::{MutationRequest, ARTIFACT_ATTR, BASE_FILTER_ATTR, FOCUS_ATTR, NODE_ID_ATTR, SAVED_STYLE_ATTR};
use serde_json::json;

/// Script that resolves once the document has been parsed.
pub const READY_STATE_SCRIPT: &str = "document.readyState";

const PRELUDE: &str = r#"
    var A = {{ATTRS}};
    var P = {{PARAMS}};
    function bakeStyle(css) {
        var style = document.createElement('style');
        style.setAttribute(A.artifact, 'style');
        style.textContent = css;
        (document.head || document.documentElement).appendChild(style);
        return style;
    }
    var FREEZE = '*,*::before,*::after{transition:none!important;animation:none!important;caret-color:transparent!important;}';
    function box(el) {
        var r = el.getBoundingClientRect();
        var cs = getComputedStyle(el);
        return {
            found: true,
            x: r.left + window.scrollX,
            y: r.top + window.scrollY,
            width: r.width,
            height: r.height,
            boxShadow: cs.boxShadow === 'none' ? null : cs.boxShadow,
            textShadow: cs.textShadow === 'none' ? null : cs.textShadow,
            filter: cs.filter === 'none' ? null : cs.filter
        };
    }
    function saveStyle(el) {
        if (!el.hasAttribute(A.saved)) {
            el.setAttribute(A.saved, el.hasAttribute('style') ? el.getAttribute('style') : '\u0000');
        }
    }
"#;

const CLEANUP: &str = r#"(function(){
    {{PRELUDE}}
    var removed = 0;
    document.querySelectorAll('[' + A.artifact + ']').forEach(function(n){ n.remove(); removed++; });
    document.querySelectorAll('[' + A.saved + ']').forEach(function(n){
        var prev = n.getAttribute(A.saved);
        if (prev === '\u0000') { n.removeAttribute('style'); } else { n.setAttribute('style', prev); }
        n.removeAttribute(A.saved);
        removed++;
    });
    document.querySelectorAll('[' + A.focus + ']').forEach(function(n){ n.removeAttribute(A.focus); removed++; });
    document.querySelectorAll('[' + A.baseFilter + ']').forEach(function(n){ n.removeAttribute(A.baseFilter); });
    return { removed: removed };
})()"#;

const ISOLATE_CLONE: &str = r#"(function(){
    {{PRELUDE}}
    var target = document.querySelector(P.selector);
    if (!target) return { found: false };
    window.scrollTo(0, 0);
    var css = FREEZE;
    var r = target.getBoundingClientRect();
    if (r.width <= 0 || r.height <= 0) { bakeStyle(css); return box(target); }

    var cs = getComputedStyle(target);
    var clone = target.cloneNode(true);
    clone.setAttribute(A.artifact, 'clone');
    if (!P.hideChildren && P.keepChildren.length) {
        Array.prototype.slice.call(clone.children).forEach(function(c){
            if (P.keepChildren.indexOf(c.getAttribute(A.node)) < 0) c.style.visibility = 'hidden';
        });
    }
    clone.removeAttribute(A.node);
    clone.querySelectorAll('[' + A.node + ']').forEach(function(n){ n.removeAttribute(A.node); });
    ['color','font','lineHeight','letterSpacing','textAlign','direction','whiteSpace','wordSpacing'].forEach(function(k){
        clone.style[k] = cs[k];
    });
    clone.style.position = 'fixed';
    clone.style.left = r.left + 'px';
    clone.style.top = r.top + 'px';
    clone.style.width = r.width + 'px';
    clone.style.height = r.height + 'px';
    clone.style.margin = '0';
    clone.style.boxSizing = 'border-box';
    clone.style.transform = 'none';
    clone.style.zIndex = '2147483647';
    clone.style.visibility = 'visible';
    if (P.fullOpacity) clone.style.opacity = '1';
    if (P.suppressFaintBorder) clone.style.borderColor = 'transparent';

    if (P.hideChildren) {
        while (clone.firstChild) clone.removeChild(clone.firstChild);
    } else if (P.stripText) {
        // Pin every descendant to its original box before its text disappears.
        var originals = target.querySelectorAll('*');
        var copies = clone.querySelectorAll('*');
        for (var i = 0; i < copies.length && i < originals.length; i++) {
            var or = originals[i].getBoundingClientRect();
            // Inline boxes collapse once their text is gone; give them a real box.
            if (getComputedStyle(originals[i]).display === 'inline') copies[i].style.display = 'inline-block';
            copies[i].style.width = or.width + 'px';
            copies[i].style.height = or.height + 'px';
            copies[i].style.boxSizing = 'border-box';
            copies[i].style.flexShrink = '0';
        }
        var walker = document.createTreeWalker(clone, NodeFilter.SHOW_TEXT);
        var texts = [];
        while (walker.nextNode()) texts.push(walker.currentNode);
        texts.forEach(function(t){ t.textContent = ''; });
        [clone].concat(Array.prototype.slice.call(clone.querySelectorAll('input,textarea,select'))).forEach(function(f){
            if ('value' in f && f.tagName !== 'SELECT') f.value = '';
            if (f.hasAttribute && f.hasAttribute('placeholder')) f.setAttribute('placeholder', '');
        });
        css += '[' + A.artifact + '="clone"],[' + A.artifact + '="clone"] *{color:transparent!important;-webkit-text-fill-color:transparent!important;text-shadow:none!important;caret-color:transparent!important;}';
        css += '[' + A.artifact + '="clone"] ::placeholder{color:transparent!important;}';
    } else if (P.hideOwnText) {
        Array.prototype.slice.call(clone.childNodes).forEach(function(n){
            if (n.nodeType === 3) n.textContent = '';
        });
    }

    if (P.isolate) {
        css += 'body > *:not([' + A.artifact + ']){visibility:hidden!important;}';
        css += 'html,body{background:transparent!important;background-image:none!important;}';
    }
    bakeStyle(css);
    document.body.appendChild(clone);
    return box(clone);
})()"#;

const ISOLATE_IN_PLACE: &str = r#"(function(){
    {{PRELUDE}}
    var target = document.querySelector(P.selector);
    if (!target) return { found: false };
    window.scrollTo(0, 0);
    saveStyle(target);
    target.setAttribute(A.focus, '1');
    var F = '[' + A.focus + ']';
    var css = FREEZE;
    if (P.isolate) {
        css += 'body,body *{visibility:hidden!important;}';
        css += F + ',' + F + ' *{visibility:visible!important;}';
        css += 'html,body{background:transparent!important;background-image:none!important;}';
    }
    if (P.hideChildren) {
        css += F + ' *{visibility:hidden!important;}';
    } else if (P.keepChildren.length) {
        css += F + ' > *{visibility:hidden!important;}';
        P.keepChildren.forEach(function(id){
            var k = F + ' > [' + A.node + '="' + CSS.escape(id) + '"]';
            css += k + ',' + k + ' *{visibility:visible!important;}';
        });
    }
    if (P.stripText) {
        css += F + ',' + F + ' *{color:transparent!important;-webkit-text-fill-color:transparent!important;text-shadow:none!important;caret-color:transparent!important;}';
        css += F + ' ::placeholder,' + F + '::placeholder{color:transparent!important;}';
    } else if (P.hideOwnText) {
        var own = getComputedStyle(target).color;
        css += F + '{color:transparent!important;-webkit-text-fill-color:transparent!important;}';
        css += F + ' > *{color:' + own + '!important;-webkit-text-fill-color:' + own + '!important;}';
    }
    if (P.fullOpacity) css += F + '{opacity:1!important;}';
    if (P.suppressFaintBorder) css += F + '{border-color:transparent!important;}';
    bakeStyle(css);
    return box(target);
})()"#;

const SET_FILTER: &str = r#"(function(){
    {{PRELUDE}}
    var target = document.querySelector('[' + A.focus + ']');
    if (!target) return { applied: false };
    saveStyle(target);
    if (!target.hasAttribute(A.baseFilter)) {
        var own = getComputedStyle(target).filter;
        target.setAttribute(A.baseFilter, own === 'none' ? '' : own);
    }
    var base = target.getAttribute(A.baseFilter);
    target.style.filter = base ? base + ' ' + P.filter : P.filter;
    return { applied: true };
})()"#;

/// Render a mutation request into a page script.
pub fn render(request: &MutationRequest) -> String {
    let (template, params) = match request {
        MutationRequest::Cleanup => (CLEANUP, json!({})),
        MutationRequest::IsolateClone(spec) => (ISOLATE_CLONE, json!(spec)),
        MutationRequest::IsolateInPlace(spec) => (ISOLATE_IN_PLACE, json!(spec)),
        MutationRequest::SetFilter { filter } => (SET_FILTER, json!({ "filter": filter })),
    };
    let attrs = json!({
        "node": NODE_ID_ATTR,
        "artifact": ARTIFACT_ATTR,
        "focus": FOCUS_ATTR,
        "saved": SAVED_STYLE_ATTR,
        "baseFilter": BASE_FILTER_ATTR,
    });
    template
        .replace("{{PRELUDE}}", PRELUDE)
        .replace("{{ATTRS}}", &attrs.to_string())
        .replace("{{PARAMS}}", &params.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::IsolationSpec;

    fn spec(id: &str) -> IsolationSpec {
        IsolationSpec {
            node_id: id.to_string(),
            selector: crate::mutation::node_selector(id),
            hide_children: false,
            hide_own_text: true,
            strip_text: true,
            isolate: true,
            full_opacity: false,
            suppress_faint_border: false,
            keep_children: Vec::new(),
        }
    }

    #[test]
    fn placeholders_are_all_substituted() {
        for req in [
            MutationRequest::Cleanup,
            MutationRequest::IsolateClone(spec("a")),
            MutationRequest::IsolateInPlace(spec("a")),
            MutationRequest::SetFilter { filter: "contrast(1.1)".into() },
        ] {
            let script = render(&req);
            assert!(!script.contains("{{"), "unsubstituted template in {}", req.kind());
            assert!(script.contains(ARTIFACT_ATTR));
        }
    }

    #[test]
    fn params_are_json_encoded() {
        let script = render(&MutationRequest::IsolateClone(spec(r#"we"ird"#)));
        assert!(script.contains(r#""nodeId":"we\"ird""#));
        assert!(script.contains(r#""stripText":true"#));
    }

    #[test]
    fn composite_members_reach_the_script() {
        let mut s = spec("hero");
        s.keep_children = vec!["bg".into(), "veil".into()];
        let script = render(&MutationRequest::IsolateInPlace(s));
        assert!(script.contains(r#""keepChildren":["bg","veil"]"#));
    }

    #[test]
    fn inline_descendants_keep_a_box() {
        let script = render(&MutationRequest::IsolateClone(spec("a")));
        let promote = script.find("style.display = 'inline-block'").unwrap();
        let blank = script.find("t.textContent = ''").unwrap();
        assert!(promote < blank);
    }

    #[test]
    fn filter_passes_stack_on_the_own_filter() {
        let script = render(&MutationRequest::SetFilter { filter: "contrast(1.2)".into() });
        assert!(script.contains("getComputedStyle(target).filter"));
        assert!(script.contains("base + ' ' + P.filter"));
        let cleanup = render(&MutationRequest::Cleanup);
        assert!(cleanup.contains("n.removeAttribute(A.baseFilter)"));
    }

    #[test]
    fn strip_text_pins_descendant_boxes() {
        let script = render(&MutationRequest::IsolateClone(spec("a")));
        assert!(script.contains("createTreeWalker"));
        assert!(script.contains("copies[i].style.width"));
    }
}
