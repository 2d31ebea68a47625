//! Title classification: coarse device category plus fine-grained iPhone
//! variant detection.
//!
//! Marketplace titles are adversarial to keyword matching: generation
//! numbers show up in prices, bundle descriptions and trade offers as well
//! as in the device actually for sale. The keyword tables below are tuned
//! heuristics, not contracts; adjust them as the listings drift.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{NewListing, RawListing, Variant};

/// Provenance tag stamped on every listing this pipeline produces.
pub const SOURCE: &str = "marketplace";

/// Titles containing any of these are multi-device business listings, not
/// single devices, and never get a variant.
const BULK_KEYWORDS: &[&str] = &[
    "wholesale",
    "bulk",
    "lot of",
    "bundle",
    "multiple",
    "collection",
    "various",
    "assorted",
];

/// Variant keywords whose absence makes a title the plain ("regular") model.
const VARIANT_KEYWORDS: &[&str] = &["pro", "plus", "max", "air", "mini", "16e"];

/// Generations that get fine-grained variants; anything older collapses.
const VARIANT_GENERATIONS: &[u8] = &[17, 16, 15, 14];

const OLDER_MARKERS: &[&str] = &[
    "iphone 13",
    "iphone 12",
    "iphone 11",
    "iphone x",
    "iphone 10",
    "iphone 8",
    "iphone 7",
    "iphone 6",
    "iphone 5",
    "iphone 4",
];

const LAPTOP_BRANDS: &[(&str, &str)] = &[
    ("dell", "Dell Laptop"),
    ("hp", "HP Laptop"),
    ("lenovo", "Lenovo Laptop"),
    ("asus", "Asus Laptop"),
    ("acer", "Acer Laptop"),
];

/// Coarse device category from free title text. Never fails; anything the
/// vocabulary does not cover comes back as `"Unknown"`.
pub fn detect_model(title: &str) -> String {
    let lower = title.to_lowercase();

    if lower.contains("macbook") {
        return macbook_model(&lower);
    }
    if lower.contains("ipad") {
        return ipad_model(&lower);
    }
    if lower.contains("iphone") {
        return iphone_model(&lower);
    }
    if lower.contains("samsung") || lower.contains("galaxy") {
        return "Samsung Galaxy".into();
    }
    if lower.contains("pixel") {
        return "Google Pixel".into();
    }
    if lower.contains("oneplus") {
        return "OnePlus".into();
    }
    for (brand, model) in LAPTOP_BRANDS {
        if contains_word(&lower, brand) {
            return (*model).into();
        }
    }

    "Unknown".into()
}

/// Fine-grained iPhone variant from title text. Pure and total: bulk or
/// ambiguous listings and undetectable titles all yield `None`.
pub fn detect_variant(title: &str) -> Option<Variant> {
    let lower = title.to_lowercase();

    if BULK_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return None;
    }

    for &gen in VARIANT_GENERATIONS {
        if !lower.contains(&format!("iphone {gen}")) {
            continue;
        }
        // A different generation number immediately followed by a comma
        // reads as "selling 14, 15, 16" rather than a single device.
        for &other in VARIANT_GENERATIONS {
            if other != gen && lower.contains(&format!("{other},")) {
                return None;
            }
        }
        if let Some(variant) = match_sub_variant(&lower, gen) {
            return Some(variant);
        }
    }

    if OLDER_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(Variant::OlderModel);
    }

    None
}

/// Sub-variant keywords in priority order; first unambiguous match wins.
fn match_sub_variant(lower: &str, gen: u8) -> Option<Variant> {
    if lower.contains("pro max") || lower.contains(&format!("{gen} pro max")) {
        return Some(Variant::ProMax(gen));
    }
    if lower.contains("pro") {
        return Some(Variant::Pro(gen));
    }
    if lower.contains("plus") {
        return Some(Variant::Plus(gen));
    }
    if gen == 17 && lower.contains("air") {
        return Some(Variant::Air(gen));
    }
    if gen == 16 && (lower.contains("16e") || lower.contains("16 e")) {
        return Some(Variant::SixteenE);
    }
    if !VARIANT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(Variant::Regular(gen));
    }
    None
}

fn iphone_model(lower: &str) -> String {
    let Some(gen) = digits_after(lower, "iphone") else {
        return "iPhone".into();
    };
    let mut model = format!("iPhone {gen}");
    if lower.contains("pro max") {
        model.push_str(" Pro Max");
    } else if lower.contains("pro") {
        model.push_str(" Pro");
    } else if lower.contains("plus") {
        model.push_str(" Plus");
    } else if lower.contains("max") {
        model.push_str(" Max");
    } else if lower.contains("air") {
        model.push_str(" Air");
    }
    model
}

fn macbook_model(lower: &str) -> String {
    if lower.contains("macbook air") {
        for chip in ["m3", "m2", "m1"] {
            if lower.contains(chip) {
                return format!("MacBook Air {}", chip.to_uppercase());
            }
        }
        for year in ["2020", "2019", "2018"] {
            if lower.contains(year) {
                return format!("MacBook Air {year}");
            }
        }
        return "MacBook Air".into();
    }
    if lower.contains("macbook pro") {
        for size in ["16", "14", "13"] {
            if lower.contains(&format!("{size}\"")) || lower.contains(&format!("{size} inch")) {
                for chip in ["m3", "m2", "m1"] {
                    if lower.contains(chip) {
                        return format!("MacBook Pro {size}\" {}", chip.to_uppercase());
                    }
                }
                return format!("MacBook Pro {size}\"");
            }
        }
        return "MacBook Pro".into();
    }
    "MacBook".into()
}

fn ipad_model(lower: &str) -> String {
    if lower.contains("ipad pro") {
        if lower.contains("12.9") || lower.contains("12 9") {
            return "iPad Pro 12.9\"".into();
        }
        if lower.contains("11") {
            return "iPad Pro 11\"".into();
        }
        return "iPad Pro".into();
    }
    if lower.contains("ipad air") {
        for chip in ["m2", "m1"] {
            if lower.contains(chip) {
                return format!("iPad Air {}", chip.to_uppercase());
            }
        }
        return "iPad Air".into();
    }
    if lower.contains("ipad mini") {
        return "iPad Mini".into();
    }
    for gen in ["10th", "9th", "8th"] {
        if lower.contains(gen) {
            return format!("iPad {gen} Gen");
        }
    }
    "iPad".into()
}

/// Digits following `prefix` (possibly separated by spaces), e.g.
/// `digits_after("iphone 15 pro", "iphone")` is `Some("15")`.
fn digits_after(lower: &str, prefix: &str) -> Option<String> {
    let rest = &lower[lower.find(prefix)? + prefix.len()..];
    let rest = rest.trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|w| w == word)
}

/// Parse a displayed price ("$1,234") into whole currency units.
/// Non-positive and unparseable prices are rejected.
pub fn parse_price(display: &str) -> Option<i64> {
    let cleaned: String = display
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    let price = value.round() as i64;
    (price > 0).then_some(price)
}

/// Turn a raw fingerprint into a persistable record, deriving model,
/// variant, provenance and the link hash. Fingerprints without a usable
/// title, link or price are dropped.
pub fn classify_listing(
    raw: &RawListing,
    search_city: &str,
    now: DateTime<Utc>,
) -> Option<NewListing> {
    if raw.title.trim().is_empty() || raw.link.trim().is_empty() {
        return None;
    }
    let price = parse_price(&raw.price)?;
    let model = detect_model(&raw.title);
    let variant = if model.contains("iPhone") {
        detect_variant(&raw.title)
    } else {
        None
    };
    let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    Some(NewListing {
        title: raw.title.clone(),
        price,
        location: raw.location.clone(),
        link: raw.link.clone(),
        model,
        variant,
        search_city: search_city.to_string(),
        source: SOURCE.to_string(),
        found_at: stamp.clone(),
        detected_at: stamp,
        link_hash: link_hash(&raw.link),
    })
}

/// md5 of the canonical link, the key of the processed-hash side table.
pub fn link_hash(link: &str) -> String {
    format!("{:x}", md5::compute(link))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pro_max_variant() {
        assert_eq!(
            detect_variant("iPhone 15 Pro Max 256GB"),
            Some(Variant::ProMax(15))
        );
        assert_eq!(detect_model("iPhone 15 Pro Max 256GB"), "iPhone 15 Pro Max");
    }

    #[test]
    fn rejects_bulk_listings() {
        assert_eq!(detect_variant("iPhone 14, 15, 16 wholesale lot"), None);
        assert_eq!(detect_variant("Bundle of iPhone 16 Pro"), None);
    }

    #[test]
    fn rejects_multi_generation_comma_listings() {
        // No bulk keyword, but "15," reads as a generation enumeration.
        assert_eq!(detect_variant("iPhone 14, 15, 16 all available"), None);
    }

    #[test]
    fn non_iphone_titles_have_no_variant() {
        assert_eq!(detect_model("Samsung Galaxy S23"), "Samsung Galaxy");
        assert_eq!(detect_variant("Samsung Galaxy S23"), None);
    }

    #[test]
    fn regular_variant_needs_no_keyword_at_all() {
        assert_eq!(detect_variant("iPhone 16 128GB"), Some(Variant::Regular(16)));
        assert_eq!(detect_variant("iPhone 16e unlocked"), Some(Variant::SixteenE));
        assert_eq!(detect_variant("iPhone 17 Air"), Some(Variant::Air(17)));
    }

    #[test]
    fn older_generations_collapse() {
        assert_eq!(detect_variant("iPhone 13 Pro Max"), Some(Variant::OlderModel));
        assert_eq!(detect_variant("iPhone X 64GB"), Some(Variant::OlderModel));
    }

    #[test]
    fn classification_is_pure() {
        let title = "iPhone 16 Pro 128GB";
        let first = (detect_model(title), detect_variant(title));
        for _ in 0..3 {
            assert_eq!((detect_model(title), detect_variant(title)), first);
        }
    }

    #[test]
    fn model_vocabulary_covers_non_phones() {
        assert_eq!(detect_model("MacBook Air M2 2022"), "MacBook Air M2");
        assert_eq!(detect_model("iPad Pro 12.9 inch"), "iPad Pro 12.9\"");
        assert_eq!(detect_model("Google Pixel 8"), "Google Pixel");
        assert_eq!(detect_model("Dell XPS 13"), "Dell Laptop");
        assert_eq!(detect_model("Vintage record player"), "Unknown");
    }

    #[test]
    fn price_parsing_rejects_junk() {
        assert_eq!(parse_price("$1,234"), Some(1234));
        assert_eq!(parse_price("$50"), Some(50));
        assert_eq!(parse_price("Free"), None);
        assert_eq!(parse_price("$0"), None);
    }

    #[test]
    fn classify_builds_a_full_record() {
        let raw = RawListing {
            price: "$800".into(),
            title: "iPhone 15 Pro Max 256GB".into(),
            location: "Austin, TX".into(),
            link: "https://example.com/marketplace/item/123/".into(),
        };
        let listing = classify_listing(&raw, "Austin", Utc::now()).unwrap();
        assert_eq!(listing.price, 800);
        assert_eq!(listing.model, "iPhone 15 Pro Max");
        assert_eq!(listing.variant, Some(Variant::ProMax(15)));
        assert_eq!(listing.search_city, "Austin");
        assert_eq!(listing.link_hash.len(), 32);
    }
}
