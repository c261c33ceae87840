//! Paginated scrape of the product listing.
//!
//! [`PaginationDriver`] walks listing pages 1, 2, 3, ... through a
//! [`Transport`], extracts products from each page and stops on the first of:
//!
//! | Stop | Condition |
//! |------|-----------|
//! | [`StopReason::EmptyPage`] | a page yields no product blocks |
//! | [`StopReason::LastPage`] | the page lacks the next-page marker or a link to the next index |
//! | [`StopReason::PageCeiling`] | `max_pages` pages were fetched |
//! | [`StopReason::TransportFailure`] | a fetch failed; records gathered so far are kept |
//!
//! Between page fetches the driver waits through a [`Pacer`]. Persistence is
//! not the driver's concern: [`run_scrape`] merges the outcome into the
//! catalog and saves once, after the run.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Map;

use crate::config::Config;
use crate::extract::{DroppedRecord, ExtractedProduct, Extractor};
use crate::models::{ImageRef, ProductRecord, NO_IMAGE};
use crate::progress::{ProgressMode, ScrapeProgressEvent, ScrapeProgressReporter};
use crate::store::CatalogStore;
use crate::transport::{page_url, HttpTransport, Transport};

/// Waits between successive page fetches.
pub trait Pacer {
    fn pause(&self);
}

/// Sleeps a fixed duration.
pub struct FixedDelay(pub Duration);

impl Pacer for FixedDelay {
    fn pause(&self) {
        if !self.0.is_zero() {
            std::thread::sleep(self.0);
        }
    }
}

/// Does not wait. For tests and `--no-delay`.
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self) {}
}

/// Listing and record-building parameters for a scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub listing_url: String,
    pub page_param: String,
    pub max_pages: u32,
    pub next_page_marker: String,
    pub detail_url_base: String,
    pub image_prefix: String,
    pub placeholder_ext: String,
}

impl ScrapeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            listing_url: config.source.listing_url.clone(),
            page_param: config.source.page_param.clone(),
            max_pages: config.source.max_pages,
            next_page_marker: config.extract.next_page_marker.clone(),
            detail_url_base: config.source.detail_url_base.clone(),
            image_prefix: config.assets.image_prefix.clone(),
            placeholder_ext: config.extract.placeholder_ext.clone(),
        }
    }

    /// Build a catalog record for a freshly scraped product.
    ///
    /// The image is a name-derived placeholder; it is never a canonical
    /// asset path and is replaced during reconciliation. A name that would
    /// read as a canonical file gets [`NO_IMAGE`] instead.
    pub fn to_record(&self, product: ExtractedProduct) -> ProductRecord {
        let url = format!("{}/{}", self.detail_url_base.trim_end_matches('/'), product.id);
        let mut image = format!(
            "{}{}.{}",
            self.image_prefix, product.name, self.placeholder_ext
        );
        if !ImageRef::classify(&image, &self.image_prefix).is_placeholder() {
            image = NO_IMAGE.to_string();
        }
        ProductRecord {
            id: product.id,
            name: product.name,
            price: product.price,
            category: product.category,
            url,
            image,
            extra: Map::new(),
        }
    }
}

/// Why pagination stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EmptyPage { page: u32 },
    LastPage { page: u32 },
    PageCeiling { max_pages: u32 },
    TransportFailure { page: u32, error: String },
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::TransportFailure { .. })
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EmptyPage { page } => write!(f, "page {} had no products", page),
            StopReason::LastPage { page } => write!(f, "page {} is the last page", page),
            StopReason::PageCeiling { max_pages } => {
                write!(f, "page ceiling of {} reached", max_pages)
            }
            StopReason::TransportFailure { page, error } => {
                write!(f, "fetching page {} failed: {}", page, error)
            }
        }
    }
}

/// Everything a scrape run gathered.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    /// Records in discovery order, unique by id.
    pub records: Vec<ProductRecord>,
    pub pages_fetched: u32,
    pub stop: StopReason,
    pub dropped: Vec<DroppedRecord>,
    /// Ids seen again after their first occurrence.
    pub repeated_ids: Vec<u64>,
}

/// Drives the extractor across listing pages.
pub struct PaginationDriver<'a, T: Transport> {
    transport: T,
    extractor: &'a Extractor,
    options: &'a ScrapeOptions,
    pacer: &'a dyn Pacer,
    progress: &'a dyn ScrapeProgressReporter,
}

impl<'a, T: Transport> PaginationDriver<'a, T> {
    pub fn new(
        transport: T,
        extractor: &'a Extractor,
        options: &'a ScrapeOptions,
        pacer: &'a dyn Pacer,
        progress: &'a dyn ScrapeProgressReporter,
    ) -> Self {
        Self {
            transport,
            extractor,
            options,
            pacer,
            progress,
        }
    }

    /// Fetch and extract pages until a stop condition holds.
    ///
    /// Never fails: a transport error ends the run and is reported in
    /// [`ScrapeOutcome::stop`] alongside everything gathered before it.
    pub fn run(&self) -> ScrapeOutcome {
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut dropped = Vec::new();
        let mut repeated_ids = Vec::new();
        let mut pages_fetched = 0;
        let mut page = 1;

        let stop = loop {
            if page > 1 {
                self.pacer.pause();
            }

            let url = page_url(&self.options.listing_url, &self.options.page_param, page);
            self.progress.report(ScrapeProgressEvent::Fetching {
                page,
                url: url.clone(),
            });
            tracing::info!(page, url = %url, "fetching listing page");

            let body = match self.transport.fetch(&url) {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(page, error = %e, "fetch failed, keeping pages gathered so far");
                    break StopReason::TransportFailure {
                        page,
                        error: e.to_string(),
                    };
                }
            };
            pages_fetched += 1;

            let content = String::from_utf8_lossy(&body);
            let extraction = self.extractor.extract(&content);
            // A page of dropped blocks still matched; only a page with no
            // match at all ends the listing.
            let matched = !extraction.is_empty();
            let found = extraction.products.len();
            dropped.extend(extraction.dropped);

            for product in extraction.products {
                if seen.insert(product.id) {
                    records.push(self.options.to_record(product));
                } else {
                    tracing::warn!(page, id = product.id, "product listed again, keeping first occurrence");
                    repeated_ids.push(product.id);
                }
            }

            self.progress.report(ScrapeProgressEvent::Extracted {
                page,
                records: found as u64,
                total: records.len() as u64,
            });
            tracing::info!(page, found, total = records.len(), "extracted listing page");

            if !matched {
                break StopReason::EmptyPage { page };
            }
            if !self.has_next_page(&content, page) {
                break StopReason::LastPage { page };
            }
            if page >= self.options.max_pages {
                break StopReason::PageCeiling {
                    max_pages: self.options.max_pages,
                };
            }
            page += 1;
        };

        tracing::info!(pages = pages_fetched, records = records.len(), stop = %stop, "scrape finished");

        ScrapeOutcome {
            records,
            pages_fetched,
            stop,
            dropped,
            repeated_ids,
        }
    }

    /// The page must carry the next-page marker and reference the next index.
    fn has_next_page(&self, content: &str, page: u32) -> bool {
        let next_ref = format!("{}={}", self.options.page_param, page + 1);
        content.contains(&self.options.next_page_marker)
            && content.match_indices(&next_ref).any(|(at, _)| {
                !content[at + next_ref.len()..]
                    .starts_with(|c: char| c.is_ascii_digit())
            })
    }
}

/// Run the `catalog scrape` command.
///
/// Loads the existing catalog (if any), scrapes the listing, merges the
/// result and saves once. A transport failure is reported as a warning;
/// whatever was gathered before it is still merged.
pub fn run_scrape(
    config: &Config,
    max_pages: Option<u32>,
    no_delay: bool,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    let store = CatalogStore::new(&config.catalog.path);
    let mut catalog = store
        .load_or_default()
        .with_context(|| "Failed to load existing catalog")?;

    let mut options = ScrapeOptions::from_config(config);
    if let Some(max) = max_pages {
        if max == 0 {
            anyhow::bail!("--max-pages must be >= 1");
        }
        options.max_pages = max;
    }

    let extractor = Extractor::new(&config.extract.pattern)?;
    let transport = HttpTransport::new(&config.source)?;
    let pacer: Box<dyn Pacer> = if no_delay {
        Box::new(NoDelay)
    } else {
        Box::new(FixedDelay(Duration::from_millis(config.source.delay_ms)))
    };
    let reporter = progress.reporter();

    let driver = PaginationDriver::new(
        &transport,
        &extractor,
        &options,
        pacer.as_ref(),
        reporter.as_ref(),
    );
    let outcome = driver.run();

    let scraped = outcome.records.len();
    let summary = catalog.merge_scraped(outcome.records)?;

    if dry_run {
        println!("scrape (dry-run)");
    } else {
        println!("scrape");
    }
    println!("  pages fetched: {}", outcome.pages_fetched);
    println!("  products found: {}", scraped);
    println!("  dropped: {}", outcome.dropped.len());
    for d in &outcome.dropped {
        println!("    - {}", d);
    }
    if !outcome.repeated_ids.is_empty() {
        println!("  repeated ids: {}", outcome.repeated_ids.len());
    }
    println!("  added: {}", summary.added);
    println!("  updated: {}", summary.updated);
    println!("  unchanged: {}", summary.unchanged);
    println!("  catalog size: {}", catalog.len());
    println!("  stopped: {}", outcome.stop);

    if outcome.stop.is_failure() {
        eprintln!("warning: {}", outcome.stop);
    }

    if dry_run {
        println!("ok");
        return Ok(());
    }

    if scraped == 0 {
        println!("  nothing to save");
    } else {
        store
            .save(&catalog)
            .with_context(|| format!("Failed to save catalog to {}", store.path().display()))?;
        println!("  saved: {}", store.path().display());
    }
    println!("ok");

    Ok(())
}
