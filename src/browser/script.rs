//! Programs evaluated inside the rendered page.
//!
//! Every script is a function body returning its result. Site-specific
//! values are injected as a JSON `CFG` object so selectors never need
//! hand-escaping.

use serde_json::json;

use crate::cli::config::SiteProfile;

/// Marks the expand control we clicked, so disappearance can be detected
/// even when it was found through the text fallback.
const EXPAND_MARKER: &str = "data-carlot-expand";

const PRELUDE: &str = r#"
const clean = (s) => (s || "").replace(/\s+/g, " ").trim();
const escapeRe = (s) => s.replace(/[.*+?^${}()|[\]\\]/g, "\\$&");
const priceRe = new RegExp(escapeRe(CFG.currency) + "\\s*[\\d,.]+");
"#;

const DETAIL_READY: &str = r#"
const heading = document.querySelector(CFG.title);
const hasTitle = !!(heading && clean(heading.innerText).length > 3);

const crumbs = document.querySelector(CFG.breadcrumb);
const hasBreadcrumb = !!(crumbs && crumbs.querySelectorAll("ol > li").length >= 2);

const hasPrice = Array.from(document.querySelectorAll("p, span, div"))
  .some(el => priceRe.test(clean(el.innerText)));

const hasImages = Array.from(document.querySelectorAll("img"))
  .some(img => (img.currentSrc || img.getAttribute("src") || img.getAttribute("data-src") || "")
    .includes(CFG.imageBucket));

return hasTitle || hasBreadcrumb || hasPrice || hasImages;
"#;

const COLLECT_HREFS: &str = r#"
const seen = new Set();
const out = [];
for (const a of document.querySelectorAll(CFG.resultAnchor)) {
  const href = (a.getAttribute("href") || "").trim();
  if (href && !seen.has(href)) {
    seen.add(href);
    out.push(href);
  }
}
return out;
"#;

const CLICK_EXPAND_CONTROL: &str = r#"
const el = document.querySelector(CFG.expandControl);
if (!el) return false;
el.setAttribute(CFG.expandMarker, "1");
el.scrollIntoView({ block: "center", inline: "center" });
el.click();
return true;
"#;

const CLICK_SHOW_MORE: &str = r#"
const el = Array.from(document.querySelectorAll("button, [role='button'], a")).find(b => {
  const t = clean(b.innerText);
  return t.includes(CFG.showMore) && /\(\d+\)/.test(t);
});
if (!el) return false;
el.setAttribute(CFG.expandMarker, "1");
el.scrollIntoView({ block: "center", inline: "center" });
el.click();
return true;
"#;

const EXTRACT_DETAIL: &str = r#"
// selectors are tried in order, not in document order
let title = null;
for (const sel of CFG.titles) {
  const el = document.querySelector(sel);
  const t = el ? clean(el.innerText) : "";
  if (t) { title = t; break; }
}

let crumbNav = null;
for (const sel of CFG.breadcrumbs) {
  crumbNav = document.querySelector(sel);
  if (crumbNav) break;
}
const breadcrumbItems = crumbNav
  ? Array.from(crumbNav.querySelectorAll("ol > li")).map(li => {
      const a = li.querySelector("a");
      const href = a ? (a.getAttribute("href") || "").trim() : "";
      return { text: li.innerText || "", href: href || null };
    })
  : [];

// price: first text node carrying the currency, else the innermost element
let priceCandidate = null;
const root = document.body || document.documentElement;
if (root) {
  const skipped = new Set(["SCRIPT", "STYLE", "NOSCRIPT", "TEMPLATE"]);
  const walker = document.createTreeWalker(root, NodeFilter.SHOW_TEXT, {
    acceptNode(n) {
      const parent = n.parentElement;
      if (!parent || skipped.has(parent.tagName)) return NodeFilter.FILTER_REJECT;
      const visible = parent.checkVisibility ? parent.checkVisibility() : parent.getClientRects().length > 0;
      return visible ? NodeFilter.FILTER_ACCEPT : NodeFilter.FILTER_REJECT;
    }
  });
  let node;
  while ((node = walker.nextNode())) {
    const t = clean(node.nodeValue);
    if (priceRe.test(t)) { priceCandidate = t; break; }
  }
}
if (!priceCandidate) {
  const matching = Array.from(document.querySelectorAll("p, span, div"))
    .filter(el => priceRe.test(clean(el.innerText)));
  const innermost = matching.find(el =>
    !Array.from(el.children).some(c => priceRe.test(clean(c.innerText))));
  if (innermost) priceCandidate = clean(innermost.innerText);
}

const imageSources = [];
const push = (s) => { s = (s || "").trim(); if (s) imageSources.push(s); };
const lastOfSrcset = (srcset) => {
  const parts = (srcset || "").split(",").map(s => s.trim()).filter(Boolean);
  return parts.length ? parts[parts.length - 1].split(/\s+/)[0] : "";
};
for (const img of document.querySelectorAll("img")) {
  push(img.currentSrc);
  push(img.getAttribute("src") || img.src);
  push(img.getAttribute("data-src"));
  push(lastOfSrcset(img.getAttribute("srcset")));
}
for (const source of document.querySelectorAll("picture source[srcset]")) {
  push(lastOfSrcset(source.getAttribute("srcset")));
}

const readPairs = (selector) => {
  const list = document.querySelector(selector);
  if (!list) return [];
  return Array.from(list.querySelectorAll("[role='listitem']")).map(item => {
    const label = item.querySelector(CFG.specLabel);
    const value = item.querySelector(CFG.specValue);
    return { label: label ? label.innerText : "", value: value ? value.innerText : "" };
  });
};

const description = document.querySelector(CFG.description);

const featureTitles = Array.from(document.querySelectorAll(CFG.featureChip))
  .map(s => s.getAttribute("title") || s.innerText || "");

const expandControl = document.querySelector(CFG.expandControl) ||
  Array.from(document.querySelectorAll("button")).find(b => {
    const t = clean(b.innerText);
    return t.includes(CFG.showMore) && t.includes("(");
  }) || null;

const canonicalEl = document.querySelector("link[rel='canonical']");
const ogEl = document.querySelector("meta[property='og:url']");

return JSON.stringify({
  title,
  breadcrumbItems,
  priceCandidate,
  imageSources,
  highlightItems: readPairs(CFG.highlights),
  measurementItems: readPairs(CFG.measurements),
  descriptionText: description ? description.innerText : null,
  descriptionHtml: description ? (description.innerHTML || null) : null,
  featureTitles,
  expandLabel: expandControl ? clean(expandControl.innerText) : null,
  canonical: canonicalEl ? canonicalEl.href || null : null,
  ogUrl: ogEl ? ogEl.getAttribute("content") || null : null,
  html: CFG.captureHtml && document.documentElement ? document.documentElement.outerHTML : null
});
"#;

fn with_config(site: &SiteProfile, capture_html: bool, body: &str) -> String {
    let cfg = json!({
        "resultAnchor": site.result_anchor_selector,
        "title": site.title_selectors.join(", "),
        "titles": site.title_selectors,
        "breadcrumb": site.breadcrumb_selectors.join(", "),
        "breadcrumbs": site.breadcrumb_selectors,
        "highlights": site.highlights_selector,
        "measurements": site.measurements_selector,
        "specLabel": site.spec_label_selector,
        "specValue": site.spec_value_selector,
        "description": site.description_selector,
        "featureChip": site.feature_chip_selector,
        "expandControl": site.expand_control_selector,
        "expandMarker": EXPAND_MARKER,
        "showMore": site.show_more_text,
        "imageBucket": site.image_bucket,
        "currency": site.currency,
        "captureHtml": capture_html,
    });
    format!("const CFG = {};\n{}\n{}", cfg, PRELUDE, body)
}

/// Scroll the window to a vertical offset
pub fn scroll_to(y: i64) -> String {
    format!("window.scrollTo(0, {});\nreturn true;", y)
}

/// Number of listing result anchors on the page
pub fn list_ready(site: &SiteProfile) -> String {
    with_config(site, false, "return document.querySelectorAll(CFG.resultAnchor).length;")
}

/// Raw hrefs of the listing result anchors, deduplicated in page order
pub fn collect_listing_hrefs(site: &SiteProfile) -> String {
    with_config(site, false, COLLECT_HREFS)
}

/// True once any detail-page content signal is present
pub fn detail_ready(site: &SiteProfile) -> String {
    with_config(site, false, DETAIL_READY)
}

pub fn count_feature_chips(site: &SiteProfile) -> String {
    with_config(site, false, "return document.querySelectorAll(CFG.featureChip).length;")
}

/// Click the expand control found by its accessible name
pub fn click_expand_control(site: &SiteProfile) -> String {
    with_config(site, false, CLICK_EXPAND_CONTROL)
}

/// Click the first clickable whose text reads "show more (N)"
pub fn click_show_more(site: &SiteProfile) -> String {
    with_config(site, false, CLICK_SHOW_MORE)
}

/// True when the control we clicked is no longer in the document
pub fn expand_control_gone(site: &SiteProfile) -> String {
    with_config(site, false, "return !document.querySelector(\"[\" + CFG.expandMarker + \"]\");")
}

/// Snapshot of every detail field, as a JSON string
pub fn extract_detail(site: &SiteProfile, capture_html: bool) -> String {
    with_config(site, capture_html, EXTRACT_DETAIL)
}
