use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Raw fingerprint of one listing card as rendered on the page.
///
/// `price` is kept exactly as displayed (`$`-prefixed, possibly with
/// thousands separators); parsing happens at classification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListing {
    pub price: String,
    pub title: String,
    pub location: String,
    pub link: String,
}

impl RawListing {
    /// Composite key used to suppress duplicate card nodes within a single
    /// extraction pass.
    pub fn composite_key(&self) -> String {
        format!("{}{}{}{}", self.price, self.title, self.location, self.link)
    }
}

/// Fine-grained iPhone classification derived from title text.
///
/// Serialized as the flat strings the dashboard consumes: `15_pro_max`,
/// `16_16e`, `17_regular`, `older_model`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Variant {
    ProMax(u8),
    Pro(u8),
    Plus(u8),
    Air(u8),
    /// The budget model in the 16 lineup ("16e").
    SixteenE,
    /// Generation mentioned with no variant keyword at all.
    Regular(u8),
    /// Generation 13 and below, including legacy non-numbered models.
    OlderModel,
}

impl Variant {
    /// Generation the variant belongs to, if it names one.
    pub fn generation(&self) -> Option<u8> {
        match self {
            Variant::ProMax(g)
            | Variant::Pro(g)
            | Variant::Plus(g)
            | Variant::Air(g)
            | Variant::Regular(g) => Some(*g),
            Variant::SixteenE => Some(16),
            Variant::OlderModel => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::ProMax(g) => write!(f, "{g}_pro_max"),
            Variant::Pro(g) => write!(f, "{g}_pro"),
            Variant::Plus(g) => write!(f, "{g}_plus"),
            Variant::Air(g) => write!(f, "{g}_air"),
            Variant::SixteenE => write!(f, "16_16e"),
            Variant::Regular(g) => write!(f, "{g}_regular"),
            Variant::OlderModel => write!(f, "older_model"),
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "older_model" {
            return Ok(Variant::OlderModel);
        }
        if s == "16_16e" {
            return Ok(Variant::SixteenE);
        }
        let (gen, suffix) = s
            .split_once('_')
            .ok_or_else(|| format!("unrecognized variant: {s}"))?;
        let gen: u8 = gen
            .parse()
            .map_err(|_| format!("unrecognized variant: {s}"))?;
        match suffix {
            "pro_max" => Ok(Variant::ProMax(gen)),
            "pro" => Ok(Variant::Pro(gen)),
            "plus" => Ok(Variant::Plus(gen)),
            "air" => Ok(Variant::Air(gen)),
            "regular" => Ok(Variant::Regular(gen)),
            _ => Err(format!("unrecognized variant: {s}")),
        }
    }
}

impl From<Variant> for String {
    fn from(v: Variant) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for Variant {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A classified observation ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    pub title: String,
    /// Whole currency units; positive by construction.
    pub price: i64,
    pub location: String,
    pub link: String,
    pub model: String,
    pub variant: Option<Variant>,
    /// Which search/query origin produced this observation.
    pub search_city: String,
    pub source: String,
    pub found_at: String,
    pub detected_at: String,
    /// md5 of the canonical link, used by the processed-hash side table.
    pub link_hash: String,
}

/// A persisted listing record as the store hands it back.
///
/// Timestamps stay strings on this side of the boundary: records written by
/// out-of-band ingestion paths can carry anything, and the pipeline treats
/// an unparseable timestamp as the epoch rather than failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: i64,
    pub location: String,
    pub link: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub variant: Option<Variant>,
    #[serde(default)]
    pub search_city: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub found_at: Option<String>,
    #[serde(default)]
    pub detected_at: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub favorited: bool,
}

impl Listing {
    pub fn from_new(id: String, new: NewListing) -> Self {
        Self {
            id,
            title: new.title,
            price: new.price,
            location: new.location,
            link: new.link,
            model: new.model,
            variant: new.variant,
            search_city: new.search_city,
            source: new.source,
            found_at: Some(new.found_at),
            detected_at: Some(new.detected_at),
            hidden: false,
            favorited: false,
        }
    }

    /// First-observation time: `detected_at` falling back to `found_at`,
    /// with missing or unparseable values collapsing to the epoch.
    pub fn observed_at(&self) -> DateTime<Utc> {
        parse_timestamp(self.detected_at.as_deref())
            .or_else(|| parse_timestamp(self.found_at.as_deref()))
            .unwrap_or_else(epoch)
    }
}

/// Parse an RFC 3339 timestamp, returning `None` on anything unparseable.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// The earliest representable observation time.
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().expect("epoch is valid")
}
