//! Name repair pass.
//!
//! Record names must not contain line breaks. Older scrapes (or hand edits)
//! can leave them in; this pass collapses each whitespace run holding a
//! break into one space and trims the result. A name that would end up
//! empty is left as it is and reported instead.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::models::{contains_line_break, normalize_text, Catalog};
use crate::store::CatalogStore;

/// Ids touched by [`repair_names`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairOutcome {
    pub repaired: Vec<u64>,
    /// Names with nothing but whitespace; left unchanged.
    pub blank: Vec<u64>,
}

/// Normalize every record name in place.
pub fn repair_names(catalog: &mut Catalog) -> RepairOutcome {
    let mut outcome = RepairOutcome::default();
    for record in &mut catalog.products {
        if !contains_line_break(&record.name) && record.name.trim() == record.name {
            continue;
        }
        let repaired = normalize_text(&record.name);
        if repaired.is_empty() {
            tracing::warn!(id = record.id, "name is blank after repair, leaving it");
            outcome.blank.push(record.id);
        } else if repaired != record.name {
            tracing::debug!(id = record.id, name = %repaired, "repaired name");
            record.name = repaired;
            outcome.repaired.push(record.id);
        }
    }
    outcome
}

/// Run the `catalog repair` command. The catalog is only written when a
/// name actually changed.
pub fn run_repair(config: &Config, dry_run: bool) -> Result<()> {
    let store = CatalogStore::new(&config.catalog.path);
    let mut catalog = store.load()?;

    let outcome = repair_names(&mut catalog);

    if dry_run {
        println!("repair (dry-run)");
    } else {
        println!("repair");
    }
    println!("  records: {}", catalog.len());
    println!("  repaired: {}", outcome.repaired.len());
    for id in &outcome.repaired {
        println!("    - {}", id);
    }
    if !outcome.blank.is_empty() {
        println!("  blank names: {}", outcome.blank.len());
        for id in &outcome.blank {
            println!("    - {}", id);
        }
    }

    if !dry_run && !outcome.repaired.is_empty() {
        store
            .save(&catalog)
            .with_context(|| format!("Failed to save catalog to {}", store.path().display()))?;
    }
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductRecord;
    use serde_json::Map;

    fn record(id: u64, name: &str) -> ProductRecord {
        ProductRecord {
            id,
            name: name.to_string(),
            price: 38000,
            category: "Shampoo".to_string(),
            url: format!("https://shop.example/products/{}", id),
            image: format!("Products/product_{}.jpg", id),
            extra: Map::new(),
        }
    }

    #[test]
    fn collapses_breaks_and_reports_changed_ids() {
        let mut catalog = Catalog::new(vec![
            record(1, "02 THE GREEN TEA\n        Тослог хуйханд"),
            record(2, "Clean name"),
            record(3, "  RENEW CAMELLIA\r\n"),
        ]);

        let outcome = repair_names(&mut catalog);

        assert_eq!(outcome.repaired, vec![1, 3]);
        assert!(outcome.blank.is_empty());
        assert_eq!(catalog.products[0].name, "02 THE GREEN TEA Тослог хуйханд");
        assert_eq!(catalog.products[2].name, "RENEW CAMELLIA");
        assert!(catalog
            .products
            .iter()
            .all(|r| !contains_line_break(&r.name)));
    }

    #[test]
    fn second_pass_is_a_noop() {
        let mut catalog = Catalog::new(vec![record(1, "a\n\nb")]);
        repair_names(&mut catalog);
        assert_eq!(repair_names(&mut catalog), RepairOutcome::default());
    }

    #[test]
    fn only_names_are_touched() {
        let mut catalog = Catalog::new(vec![record(1, "x\ny")]);
        catalog.products[0].category = "Hair\nCare".to_string();

        repair_names(&mut catalog);

        assert_eq!(catalog.products[0].category, "Hair\nCare");
    }

    #[test]
    fn whitespace_only_name_is_reported_not_blanked() {
        let mut catalog = Catalog::new(vec![record(1, " \n\t\r\n "), record(2, "a\nb")]);

        let outcome = repair_names(&mut catalog);

        assert_eq!(outcome.repaired, vec![2]);
        assert_eq!(outcome.blank, vec![1]);
        assert_eq!(catalog.products[0].name, " \n\t\r\n ");
        assert!(catalog.products.iter().all(|r| !r.name.is_empty()));
    }
}
