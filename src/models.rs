//! Core data models used throughout the catalog pipelines.
//!
//! A [`Catalog`] is an ordered sequence of [`ProductRecord`]s keyed by a
//! unique numeric id. Asset files are tied to records through the
//! [`CanonicalName`] scheme `product_<id>.<ext>`; any `image` value that is
//! not such a name under the configured prefix is a placeholder.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CatalogError;

/// One product in the catalog.
///
/// Field order here is the key order of the persisted document. Fields the
/// pipeline does not know about are carried in `extra` so a rewrite never
/// drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: u64,
    pub name: String,
    pub price: u64,
    pub category: String,
    pub url: String,
    pub image: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The persisted product collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub products: Vec<ProductRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Positions of records by id. Built by [`Catalog::index`].
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    positions: HashMap<u64, usize>,
}

impl CatalogIndex {
    pub fn position(&self, id: u64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.positions.contains_key(&id)
    }
}

/// Counts produced by [`Catalog::merge_scraped`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl Catalog {
    pub fn new(products: Vec<ProductRecord>) -> Self {
        Self {
            products,
            extra: Map::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Map every id to its position, failing on the first repeated id.
    pub fn index(&self) -> Result<CatalogIndex, CatalogError> {
        let mut positions = HashMap::with_capacity(self.products.len());
        for (pos, record) in self.products.iter().enumerate() {
            if positions.insert(record.id, pos).is_some() {
                return Err(CatalogError::DuplicateId(record.id));
            }
        }
        Ok(CatalogIndex { positions })
    }

    /// Fold freshly scraped records into this catalog.
    ///
    /// Existing records keep their position, their `image` and any extra
    /// fields; `name`, `price`, `category` and `url` are refreshed. Unknown
    /// ids are appended in the order given. Nothing is ever removed.
    pub fn merge_scraped(
        &mut self,
        scraped: Vec<ProductRecord>,
    ) -> Result<MergeSummary, CatalogError> {
        let mut index = self.index()?;
        let mut summary = MergeSummary::default();

        for fresh in scraped {
            match index.position(fresh.id) {
                Some(pos) => {
                    let existing = &mut self.products[pos];
                    let changed = existing.name != fresh.name
                        || existing.price != fresh.price
                        || existing.category != fresh.category
                        || existing.url != fresh.url;
                    if changed {
                        existing.name = fresh.name;
                        existing.price = fresh.price;
                        existing.category = fresh.category;
                        existing.url = fresh.url;
                        summary.updated += 1;
                    } else {
                        summary.unchanged += 1;
                    }
                }
                None => {
                    index.positions.insert(fresh.id, self.products.len());
                    self.products.push(fresh);
                    summary.added += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// A filename in the canonical `product_<id>.<ext>` form.
///
/// The extension keeps the case of the source file it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalName {
    pub id: u64,
    pub ext: String,
}

impl CanonicalName {
    pub fn new(id: u64, ext: impl Into<String>) -> Self {
        Self {
            id,
            ext: ext.into(),
        }
    }

    /// Canonical name for `id` that keeps the extension of `source`.
    pub fn for_source(id: u64, source: &str) -> Self {
        let ext = Path::new(source)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { id, ext }
    }

    /// Parse a bare filename. Ids with leading zeros are not canonical.
    pub fn parse(file_name: &str) -> Option<Self> {
        let rest = file_name.strip_prefix("product_")?;
        let (digits, ext) = match rest.split_once('.') {
            Some((digits, ext)) if !ext.is_empty() => (digits, ext),
            Some(_) => return None,
            None => (rest, ""),
        };
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || digits.starts_with('0')
        {
            return None;
        }
        let id = digits.parse().ok()?;
        Some(Self::new(id, ext))
    }

    pub fn file_name(&self) -> String {
        if self.ext.is_empty() {
            format!("product_{}", self.id)
        } else {
            format!("product_{}.{}", self.id, self.ext)
        }
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// What a record's `image` value refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// A canonical asset file under the image prefix.
    Asset(CanonicalName),
    /// Anything else: inline data URIs, name-derived scrape placeholders.
    Placeholder,
}

impl ImageRef {
    pub fn classify(image: &str, prefix: &str) -> Self {
        image
            .strip_prefix(prefix)
            .filter(|rest| !rest.contains('/') && !rest.contains('\\'))
            .and_then(CanonicalName::parse)
            .map(ImageRef::Asset)
            .unwrap_or(ImageRef::Placeholder)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ImageRef::Placeholder)
    }
}

impl ProductRecord {
    pub fn image_ref(&self, prefix: &str) -> ImageRef {
        ImageRef::classify(&self.image, prefix)
    }
}

/// Placeholder `image` for records with no usable name-derived path.
pub const NO_IMAGE: &str = "data:,";

/// `image` value for a canonical asset under `prefix`.
pub fn asset_image_path(prefix: &str, name: &CanonicalName) -> String {
    format!("{}{}", prefix, name.file_name())
}

/// Collapse every whitespace run that contains a line break into a single
/// space, then trim.
///
/// Runs without a line break are kept as they are.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    let mut run_breaks = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            run_breaks |= is_line_break(ch);
            run.push(ch);
            continue;
        }
        flush_whitespace(&mut out, &mut run, &mut run_breaks);
        out.push(ch);
    }
    flush_whitespace(&mut out, &mut run, &mut run_breaks);

    out.trim().to_string()
}

pub fn contains_line_break(text: &str) -> bool {
    text.chars().any(is_line_break)
}

fn is_line_break(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

fn flush_whitespace(out: &mut String, run: &mut String, run_breaks: &mut bool) {
    if *run_breaks {
        out.push(' ');
    } else {
        out.push_str(run);
    }
    run.clear();
    *run_breaks = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, name: &str, image: &str) -> ProductRecord {
        ProductRecord {
            id,
            name: name.to_string(),
            price: 1000,
            category: "Shampoo".to_string(),
            url: format!("https://shop.example/products/{}", id),
            image: image.to_string(),
            extra: Map::new(),
        }
    }

    #[test]
    fn canonical_name_keeps_extension_case() {
        let name = CanonicalName::for_source(578302, "02 THE GREEN TEA серум .WEBP");
        assert_eq!(name.file_name(), "product_578302.WEBP");
    }

    #[test]
    fn canonical_name_without_extension() {
        let name = CanonicalName::for_source(7, "README");
        assert_eq!(name.file_name(), "product_7");
        assert_eq!(CanonicalName::parse("product_7"), Some(name));
    }

    #[test]
    fn canonical_parse_rejects_non_canonical() {
        assert_eq!(
            CanonicalName::parse("product_583870.jpg"),
            Some(CanonicalName::new(583870, "jpg"))
        );
        assert!(CanonicalName::parse("product_.jpg").is_none());
        assert!(CanonicalName::parse("product_012.jpg").is_none());
        assert!(CanonicalName::parse("product_12a.jpg").is_none());
        assert!(CanonicalName::parse("product_12.").is_none());
        assert!(CanonicalName::parse("Products_12.jpg").is_none());
        assert!(CanonicalName::parse("01 COLOR&PERM SHAMPOO.jpg").is_none());
    }

    #[test]
    fn classify_image_values() {
        assert_eq!(
            ImageRef::classify("Products/product_5.jpg", "Products/"),
            ImageRef::Asset(CanonicalName::new(5, "jpg"))
        );
        assert!(ImageRef::classify("data:image/svg+xml;base64,AAAA", "Products/").is_placeholder());
        assert!(ImageRef::classify("Products/Green tea shampoo.jpg", "Products/").is_placeholder());
        assert!(ImageRef::classify("Products/sub/product_5.jpg", "Products/").is_placeholder());
        assert!(ImageRef::classify("product_5.jpg", "Products/").is_placeholder());
    }

    #[test]
    fn normalize_collapses_line_breaks_only() {
        assert_eq!(normalize_text("  GREEN\n   TEA  "), "GREEN TEA");
        assert_eq!(normalize_text("a\r\n\r\nb"), "a b");
        assert_eq!(normalize_text("a  b"), "a  b");
        assert_eq!(normalize_text("Хуйх\u{2028}чангалах"), "Хуйх чангалах");
        assert_eq!(normalize_text("\n\n"), "");
        assert!(!contains_line_break(&normalize_text("x\ny\rz")));
    }

    #[test]
    fn index_rejects_duplicate_ids() {
        let catalog = Catalog::new(vec![record(1, "a", ""), record(2, "b", ""), record(1, "c", "")]);
        match catalog.index() {
            Err(CatalogError::DuplicateId(id)) => assert_eq!(id, 1),
            other => panic!("expected duplicate id error, got {:?}", other),
        }
    }

    #[test]
    fn merge_keeps_images_and_order() {
        let mut catalog = Catalog::new(vec![
            record(10, "Old name", "Products/product_10.jpg"),
            record(20, "Kept", "data:image/svg+xml,x"),
        ]);

        let mut refreshed = record(10, "New name", "Products/New name.jpg");
        refreshed.price = 2500;
        let summary = catalog
            .merge_scraped(vec![refreshed, record(30, "Added", "Products/Added.jpg")])
            .unwrap();

        assert_eq!(
            summary,
            MergeSummary {
                added: 1,
                updated: 1,
                unchanged: 0
            }
        );
        let ids: Vec<u64> = catalog.products.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
        assert_eq!(catalog.products[0].name, "New name");
        assert_eq!(catalog.products[0].price, 2500);
        assert_eq!(catalog.products[0].image, "Products/product_10.jpg");
    }
}
