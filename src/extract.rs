//! Structural record extraction from listing pages.
//!
//! A listing page is matched against a single regular expression with the
//! named groups `id`, `name`, `category` and `price`, in that order. Every
//! match is one product. A page whose markup does not match yields no
//! products; that is how the end of a listing looks, not an error.
//!
//! The pattern is configuration. [`DEFAULT_PATTERN`] matches the product
//! grid of the listing this tool was built against.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::models::normalize_text;

/// Built-in listing pattern. Compiled case-insensitive with `.` matching
/// newlines.
pub const DEFAULT_PATTERN: &str = concat!(
    r##"<a href="/products/(?P<id>\d+)" class="product-title.*?>(?P<name>[^<]+)</a>\s*.*?"##,
    r##"<a href="#" class="product-category fw-normal.*?>(?P<category>[^<]+)</a>\s*.*?"##,
    r##"<h5 class="product-product-price.*?>(?P<price>[0-9,]+)<span class="currency">₮</span>"##,
);

const REQUIRED_GROUPS: [&str; 4] = ["id", "name", "category", "price"];

/// Characters stripped from price text before parsing.
const PRICE_SEPARATORS: [char; 6] = [',', '.', ' ', '\u{a0}', '\'', '_'];

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid extraction pattern: {0}")]
    Invalid(#[from] regex::Error),
    #[error("extraction pattern is missing the named group '{0}'")]
    MissingGroup(&'static str),
}

/// One product as it appears on a listing page, before it becomes a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedProduct {
    pub id: u64,
    pub name: String,
    pub category: String,
    pub price: u64,
}

/// Why a matched block was not turned into a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    InvalidId(String),
    InvalidPrice(String),
    EmptyName,
}

/// A matched block that was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRecord {
    /// Raw id text as matched.
    pub id: String,
    pub reason: DropReason,
}

impl std::fmt::Display for DroppedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            DropReason::InvalidId(raw) => write!(f, "invalid id '{}'", raw),
            DropReason::InvalidPrice(raw) => write!(f, "id {}: invalid price '{}'", self.id, raw),
            DropReason::EmptyName => write!(f, "id {}: empty name", self.id),
        }
    }
}

/// Result of extracting one page.
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub products: Vec<ExtractedProduct>,
    pub dropped: Vec<DroppedRecord>,
}

impl PageExtraction {
    /// True when the page shape did not match at all.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.dropped.is_empty()
    }
}

/// Compiled extraction pattern.
#[derive(Debug, Clone)]
pub struct Extractor {
    pattern: Regex,
}

impl Extractor {
    /// Compile `pattern` and check it declares every required group.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()?;

        for group in REQUIRED_GROUPS {
            if !regex.capture_names().flatten().any(|name| name == group) {
                return Err(PatternError::MissingGroup(group));
            }
        }

        Ok(Self { pattern: regex })
    }

    pub fn listing() -> Result<Self, PatternError> {
        Self::new(DEFAULT_PATTERN)
    }

    /// Extract every product block from `page`, in page order.
    ///
    /// Blocks with an unparseable id or price, or an empty name, are dropped
    /// and logged; the rest of the page is still extracted.
    pub fn extract(&self, page: &str) -> PageExtraction {
        let mut out = PageExtraction::default();

        for caps in self.pattern.captures_iter(page) {
            let group = |name: &str| caps.name(name).map(|m| m.as_str()).unwrap_or_default();
            let raw_id = group("id").trim();

            let id = match raw_id.parse::<u64>() {
                Ok(id) if id > 0 => id,
                _ => {
                    drop_block(&mut out, raw_id, DropReason::InvalidId(raw_id.to_string()));
                    continue;
                }
            };

            let raw_price = group("price");
            let price = match parse_price(raw_price) {
                Some(price) => price,
                None => {
                    drop_block(
                        &mut out,
                        raw_id,
                        DropReason::InvalidPrice(raw_price.trim().to_string()),
                    );
                    continue;
                }
            };

            let name = normalize_text(group("name"));
            if name.is_empty() {
                drop_block(&mut out, raw_id, DropReason::EmptyName);
                continue;
            }

            out.products.push(ExtractedProduct {
                id,
                name,
                category: normalize_text(group("category")),
                price,
            });
        }

        out
    }
}

fn drop_block(out: &mut PageExtraction, raw_id: &str, reason: DropReason) {
    let dropped = DroppedRecord {
        id: raw_id.to_string(),
        reason,
    };
    tracing::warn!(record = %dropped, "dropping product block");
    out.dropped.push(dropped);
}

/// Parse price text such as `45,000` into integral currency units.
///
/// Grouping separators are stripped; anything else that is not a digit
/// makes the price invalid.
pub fn parse_price(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !PRICE_SEPARATORS.contains(c))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
