use regex::Regex;
use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashSet};

use crate::cli::config::SiteProfile;

/// One breadcrumb entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BreadcrumbLink {
    pub text: String,
    pub href: Option<String>,
}

/// A labeled spec entry (highlight or measurement)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SpecPair {
    pub label: String,
    pub value: String,
}

/// Structured content of one vehicle detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetailRecord {
    pub title: Option<String>,

    pub breadcrumbs: Vec<String>,
    pub breadcrumb_links: Vec<BreadcrumbLink>,
    /// Breadcrumb texts joined with " > "
    pub breadcrumb_text: Option<String>,

    /// Currency-prefixed price as matched on the page
    pub price_text: Option<String>,
    /// Digits of `price_text`; `None` when it carries no digits
    pub price_number: Option<i64>,

    pub images: Vec<String>,
    pub image_thumbs: Vec<String>,

    pub highlights_pairs: Vec<SpecPair>,
    pub highlights: BTreeMap<String, String>,

    pub measurements_pairs: Vec<SpecPair>,
    pub measurements: BTreeMap<String, String>,

    pub description_text: Option<String>,
    pub description_html: Option<String>,

    pub features: Vec<String>,
    /// Total announced on the "show more (N)" control
    pub features_count_hint: Option<u32>,

    pub canonical: Option<String>,
    pub og_url: Option<String>,

    /// Full rendered document, only when capture is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl DetailRecord {
    /// True when the page yielded none of the identifying fields
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.price_text.is_none()
            && self.breadcrumbs.is_empty()
            && self.images.is_empty()
    }
}

/// Raw values read from the page in one evaluation, before any policy
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSnapshot {
    pub title: Option<String>,
    pub breadcrumb_items: Vec<BreadcrumbLink>,
    pub price_candidate: Option<String>,
    pub image_sources: Vec<String>,
    pub highlight_items: Vec<SpecPair>,
    pub measurement_items: Vec<SpecPair>,
    pub description_text: Option<String>,
    pub description_html: Option<String>,
    pub feature_titles: Vec<String>,
    pub expand_label: Option<String>,
    pub canonical: Option<String>,
    pub og_url: Option<String>,
    pub html: Option<String>,
}

/// Collapse runs of whitespace and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(normalize_whitespace).filter(|t| !t.is_empty())
}

/// Keep the first occurrence of every item, in order
pub fn dedup_ordered<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items.into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Digits of `text` as a number, `None` if there are none. Values past
/// the BSON integer range are clamped to `i64::MAX`.
pub fn price_number(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse().unwrap_or(i64::MAX))
}

/// Find the currency amount in `text`, e.g. "SAR 123,456"
pub fn match_price(text: &str, currency: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"{}\s*[\d,.]+", regex::escape(currency))).ok()?;
    pattern.find(text).map(|m| m.as_str().to_string())
}

/// Vehicle photos: the curated renditions when there are any, otherwise
/// everything in the vehicle-image bucket. Never a mix of both.
pub fn select_images(sources: &[String], site: &SiteProfile) -> Vec<String> {
    let bucket: Vec<&String> = sources.iter()
        .filter(|s| s.contains(&site.image_bucket))
        .collect();

    let curated: Vec<&String> = bucket.iter()
        .copied()
        .filter(|s| site.curated_image_markers.iter().any(|m| s.contains(m.as_str())))
        .collect();

    let pick = if curated.is_empty() { bucket } else { curated };
    dedup_ordered(pick.into_iter().cloned())
}

/// Thumbnail renditions, deduplicated on their own
pub fn select_thumbnails(sources: &[String], site: &SiteProfile) -> Vec<String> {
    dedup_ordered(
        sources.iter()
            .filter(|s| s.contains(&site.thumbnail_marker))
            .cloned(),
    )
}

/// Drop pairs with an empty side; build the map with later labels winning
pub fn spec_pairs(items: &[SpecPair]) -> (Vec<SpecPair>, BTreeMap<String, String>) {
    let pairs: Vec<SpecPair> = items.iter()
        .map(|p| SpecPair {
            label: normalize_whitespace(&p.label),
            value: normalize_whitespace(&p.value),
        })
        .filter(|p| !p.label.is_empty() && !p.value.is_empty())
        .collect();

    let map = pairs.iter()
        .map(|p| (p.label.clone(), p.value.clone()))
        .collect();

    (pairs, map)
}

/// Number inside the first "(N)" of a control label
pub fn count_hint(label: &str) -> Option<u32> {
    let pattern = Regex::new(r"\((\d+)\)").ok()?;
    pattern.captures(label)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
        .filter(|n| *n > 0)
}

/// Apply every field policy to a page snapshot
pub fn assemble(snapshot: PageSnapshot, site: &SiteProfile) -> DetailRecord {
    let breadcrumb_links: Vec<BreadcrumbLink> = snapshot.breadcrumb_items.iter()
        .filter_map(|item| {
            let text = normalize_whitespace(&item.text);
            if text.is_empty() {
                return None;
            }
            Some(BreadcrumbLink {
                text,
                href: non_empty(item.href.as_deref()),
            })
        })
        .collect();
    let breadcrumbs: Vec<String> = breadcrumb_links.iter().map(|b| b.text.clone()).collect();
    let breadcrumb_text = (!breadcrumbs.is_empty()).then(|| breadcrumbs.join(" > "));

    let price_text = non_empty(snapshot.price_candidate.as_deref())
        .map(|candidate| match_price(&candidate, &site.currency).unwrap_or(candidate));
    let price_number = price_text.as_deref().and_then(price_number);

    let (highlights_pairs, highlights) = spec_pairs(&snapshot.highlight_items);
    let (measurements_pairs, measurements) = spec_pairs(&snapshot.measurement_items);

    let features = dedup_ordered(
        snapshot.feature_titles.iter()
            .map(|t| normalize_whitespace(t))
            .filter(|t| !t.is_empty()),
    );

    DetailRecord {
        title: non_empty(snapshot.title.as_deref()),
        breadcrumbs,
        breadcrumb_links,
        breadcrumb_text,
        price_text,
        price_number,
        images: select_images(&snapshot.image_sources, site),
        image_thumbs: select_thumbnails(&snapshot.image_sources, site),
        highlights_pairs,
        highlights,
        measurements_pairs,
        measurements,
        description_text: non_empty(snapshot.description_text.as_deref()),
        description_html: snapshot.description_html.filter(|h| !h.trim().is_empty()),
        features,
        features_count_hint: snapshot.expand_label.as_deref().and_then(count_hint),
        canonical: non_empty(snapshot.canonical.as_deref()),
        og_url: non_empty(snapshot.og_url.as_deref()),
        html: snapshot.html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_price_number() {
        assert_eq!(price_number("SAR 123,456"), Some(123456));
        assert_eq!(price_number("SAR"), None);
        assert_eq!(price_number(""), None);
        assert_eq!(price_number("SAR 10,000,000,000,000,000,000"), Some(i64::MAX));
        assert_eq!(price_number("99999999999999999999999"), Some(i64::MAX));
    }

    #[test]
    fn test_match_price_anywhere_in_text() {
        assert_eq!(
            match_price("\u{200f}يبدأ من SAR 89,900 شامل", "SAR").as_deref(),
            Some("SAR 89,900")
        );
        assert_eq!(match_price("Price on request", "SAR"), None);
    }

    #[test]
    fn test_curated_images_win_over_fallback() {
        let site = SiteProfile::default();
        let sources = s(&[
            "https://cdn.example/resized/car_model/1/webp_gallery_small.webp",
            "https://cdn.example/resized/car_model/1/webp_listing_main.webp",
            "https://cdn.example/logo.png",
            "https://cdn.example/resized/car_model/1/webp_slide_show_2.webp",
            "https://cdn.example/resized/car_model/1/webp_listing_main.webp",
        ]);

        assert_eq!(
            select_images(&sources, &site),
            s(&[
                "https://cdn.example/resized/car_model/1/webp_listing_main.webp",
                "https://cdn.example/resized/car_model/1/webp_slide_show_2.webp",
            ])
        );
    }

    #[test]
    fn test_fallback_bucket_when_nothing_curated() {
        let site = SiteProfile::default();
        let sources = s(&[
            "https://cdn.example/resized/car_model/1/a.webp",
            "https://cdn.example/banner.jpg",
            "https://cdn.example/resized/car_model/1/a.webp",
            "https://cdn.example/resized/car_model/1/b.webp",
        ]);

        assert_eq!(
            select_images(&sources, &site),
            s(&[
                "https://cdn.example/resized/car_model/1/a.webp",
                "https://cdn.example/resized/car_model/1/b.webp",
            ])
        );
        assert!(select_images(&s(&["https://cdn.example/banner.jpg"]), &site).is_empty());
    }

    #[test]
    fn test_spec_pairs_filter_and_overwrite() {
        let items = vec![
            SpecPair { label: " Engine ".into(), value: "2.0L\n Turbo".into() },
            SpecPair { label: "Seats".into(), value: "  ".into() },
            SpecPair { label: "".into(), value: "orphan".into() },
            SpecPair { label: "Engine".into(), value: "2.5L".into() },
        ];

        let (pairs, map) = spec_pairs(&items);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].value, "2.0L Turbo");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("Engine").map(String::as_str), Some("2.5L"));
    }

    #[test]
    fn test_count_hint() {
        assert_eq!(count_hint("عرض المزيد (57)"), Some(57));
        assert_eq!(count_hint("Show more"), None);
        assert_eq!(count_hint("(0)"), None);
    }

    #[test]
    fn test_assemble_snapshot() {
        let site = SiteProfile::default();
        let snapshot = PageSnapshot {
            title: Some("  Toyota   Camry 2025 ".into()),
            breadcrumb_items: vec![
                BreadcrumbLink { text: "Home".into(), href: Some("/ar".into()) },
                BreadcrumbLink { text: " ".into(), href: None },
                BreadcrumbLink { text: "Toyota".into(), href: Some(" ".into()) },
            ],
            price_candidate: Some("يبدأ من SAR 123,456".into()),
            image_sources: s(&[
                "https://cdn.example/resized/car_model/9/webp_thumb_1.webp",
                "https://cdn.example/resized/car_model/9/webp_slide_show_1.webp",
                "https://cdn.example/resized/car_model/9/webp_thumb_1.webp",
            ]),
            feature_titles: s(&["ABS", "Sunroof", "ABS", " "]),
            expand_label: Some("عرض المزيد (40)".into()),
            ..PageSnapshot::default()
        };

        let record = assemble(snapshot, &site);

        assert_eq!(record.title.as_deref(), Some("Toyota Camry 2025"));
        assert_eq!(record.breadcrumbs, s(&["Home", "Toyota"]));
        assert_eq!(record.breadcrumb_links[1].href, None);
        assert_eq!(record.breadcrumb_text.as_deref(), Some("Home > Toyota"));
        assert_eq!(record.price_text.as_deref(), Some("SAR 123,456"));
        assert_eq!(record.price_number, Some(123456));
        assert_eq!(record.images, s(&["https://cdn.example/resized/car_model/9/webp_slide_show_1.webp"]));
        assert_eq!(record.image_thumbs, s(&["https://cdn.example/resized/car_model/9/webp_thumb_1.webp"]));
        assert_eq!(record.features, s(&["ABS", "Sunroof"]));
        assert_eq!(record.features_count_hint, Some(40));
        assert!(!record.is_empty());
    }

    #[test]
    fn test_empty_snapshot_gives_empty_record() {
        let record = assemble(PageSnapshot::default(), &SiteProfile::default());
        assert!(record.is_empty());
        assert_eq!(record, DetailRecord::default());
    }
}
