//! # Catalog Sync
//!
//! Keeps a local product catalog in step with a remote storefront listing
//! and with an operator-managed directory of product images.
//!
//! Two independent batch pipelines share one on-disk catalog document:
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌──────────────┐
//! │ Pagination │──▶│ Extractor │──▶│ CatalogStore │  catalog scrape
//! │   Driver   │   │  (regex)  │   │    (JSON)    │
//! └────────────┘   └───────────┘   └──────┬───────┘
//!                                         │
//!                  ┌──────────────────────┤
//!                  ▼                      ▼
//!            ┌────────────┐        ┌────────────┐
//!            │ Reconciler │───────▶│  Checker   │  catalog reconcile
//!            │ (mapping)  │        │ (read-only)│
//!            └────────────┘        └────────────┘
//! ```
//!
//! Each run loads the catalog once, works on it in memory and saves it once.
//!
//! ## Quick Start
//!
//! ```bash
//! catalog scrape                   # fetch the listing, merge into the catalog
//! catalog repair                   # collapse line breaks in names
//! catalog reconcile --dry-run      # preview asset renames
//! catalog reconcile                # rename assets, update image references
//! catalog reconcile --from-images  # map files named by the catalog's image paths
//! catalog check                    # count placeholder images
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Records, catalog, canonical asset names |
//! | [`error`] | Typed errors per component |
//! | [`extract`] | Listing page record extraction |
//! | [`transport`] | Page fetching over HTTP |
//! | [`scrape`] | Pagination driver and `scrape` command |
//! | [`store`] | Catalog document load/save |
//! | [`assets`] | Asset directory abstraction |
//! | [`mapping`] | Operator rename mapping |
//! | [`reconcile`] | Asset reconciliation |
//! | [`repair`] | Name repair pass |
//! | [`check`] | Consistency checker |
//! | [`progress`] | Scrape progress reporting |

pub mod assets;
pub mod check;
pub mod config;
pub mod error;
pub mod extract;
pub mod mapping;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod repair;
pub mod scrape;
pub mod store;
pub mod transport;
