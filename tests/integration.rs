use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn catalog_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("catalog");
    path
}

const CATALOG: &str = r#"{
  "products": [
    {
      "id": 578330,
      "name": "02 THE GREEN TEA\n    Тослог хуйханд",
      "price": 45000,
      "category": "Шампунь",
      "url": "https://shop.example/products/578330",
      "image": "Products/02 THE GREEN TEA Тослог хуйханд.jpg"
    },
    {
      "id": 578458,
      "name": "01 COLOR&PERM SHAMPOO",
      "price": 38000,
      "category": "Шампунь",
      "url": "https://shop.example/products/578458",
      "image": "data:image/svg+xml;base64,PHN2Zz4="
    },
    {
      "id": 579432,
      "name": "06 RENEW CAMELLIA",
      "price": 52000,
      "category": "Серум",
      "url": "https://shop.example/products/579432",
      "image": "data:image/svg+xml;base64,PHN2Zz4=",
      "featured": true
    }
  ]
}
"#;

const MAPPING: &str = r#"
extras = ["01 HARD SPRITZ - Amos Professional.jpg"]

[rename]
"02 THE GREEN TEA Тослог хуйханд.jpg" = 578330
"01 COLOR&PERM SHAMPOO, CONDITIONER.webp" = 578458
"06 RENEW CAMELLIA.jpg" = 579432
"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("products.json"), CATALOG).unwrap();

    let assets_dir = root.join("Products");
    fs::create_dir_all(&assets_dir).unwrap();
    fs::write(assets_dir.join("02 THE GREEN TEA Тослог хуйханд.jpg"), b"green tea").unwrap();
    fs::write(assets_dir.join("01 COLOR&PERM SHAMPOO, CONDITIONER.webp"), b"color perm").unwrap();
    fs::write(assets_dir.join("01 HARD SPRITZ - Amos Professional.jpg"), b"spritz").unwrap();
    fs::write(assets_dir.join("unsorted.png"), b"who knows").unwrap();

    fs::write(config_dir.join("rename_map.toml"), MAPPING).unwrap();

    let config_content = format!(
        r#"[catalog]
path = "{root}/data/products.json"

[source]
listing_url = "http://127.0.0.1:9/products"
detail_url_base = "http://127.0.0.1:9/products"
max_pages = 3
delay_ms = 0
timeout_secs = 2

[assets]
dir = "{root}/Products"
mapping = "{root}/config/rename_map.toml"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("catalog.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_catalog(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = catalog_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run catalog binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn catalog_json(root: &Path) -> serde_json::Value {
    let content = fs::read_to_string(root.join("data/products.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn asset_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root.join("Products"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn test_check_reports_placeholders() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_catalog(&config_path, &["check"]);
    assert!(success, "check failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("placeholders: 3 / 3"), "stdout={}", stdout);
    assert!(stdout.contains("ok"));
}

#[test]
fn test_reconcile_renames_and_updates_images() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_catalog(&config_path, &["reconcile"]);
    assert!(success, "reconcile failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("renamed: 2"));
    assert!(stdout.contains("skipped: 1"));
    assert!(stdout.contains("06 RENEW CAMELLIA.jpg"));
    assert!(stdout.contains("extras removed: 1"));
    assert!(stdout.contains("unmapped: 1"));
    assert!(stdout.contains("placeholders: 1 / 3"));

    assert_eq!(
        asset_names(tmp.path()),
        vec![
            "product_578330.jpg".to_string(),
            "product_578458.webp".to_string(),
            "unsorted.png".to_string(),
        ]
    );

    let doc = catalog_json(tmp.path());
    let products = doc["products"].as_array().unwrap();
    assert_eq!(products[0]["image"], "Products/product_578330.jpg");
    assert_eq!(products[1]["image"], "Products/product_578458.webp");
    assert!(products[2]["image"].as_str().unwrap().starts_with("data:"));
    assert_eq!(products[2]["featured"], true);
}

#[test]
fn test_reconcile_twice_is_stable() {
    let (tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_catalog(&config_path, &["reconcile"]);
    assert!(success1, "First reconcile failed");
    let catalog_after_first = fs::read(tmp.path().join("data/products.json")).unwrap();
    let assets_after_first = asset_names(tmp.path());

    let (stdout, stderr, success2) = run_catalog(&config_path, &["reconcile"]);
    assert!(success2, "second reconcile failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("renamed: 0"));
    assert!(stdout.contains("already canonical: 2"));
    assert!(stdout.contains("extras removed: 0"));

    assert_eq!(fs::read(tmp.path().join("data/products.json")).unwrap(), catalog_after_first);
    assert_eq!(asset_names(tmp.path()), assets_after_first);
}

#[test]
fn test_reconcile_dry_run_touches_nothing() {
    let (tmp, config_path) = setup_test_env();
    let assets_before = asset_names(tmp.path());

    let (stdout, stderr, success) = run_catalog(&config_path, &["reconcile", "--dry-run"]);
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("reconcile (dry-run)"));
    assert!(stdout.contains("renamed: 2"));

    assert_eq!(asset_names(tmp.path()), assets_before);
    assert_eq!(
        fs::read_to_string(tmp.path().join("data/products.json")).unwrap(),
        CATALOG
    );
}

#[test]
fn test_reconcile_rejects_duplicate_mapping_targets() {
    let (tmp, config_path) = setup_test_env();
    let bad = tmp.path().join("config/bad_map.toml");
    fs::write(&bad, "[rename]\n\"a.jpg\" = 578330\n\"b.jpg\" = 578330\n").unwrap();

    let (_, stderr, success) = run_catalog(
        &config_path,
        &["reconcile", "--mapping", bad.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("578330"), "stderr={}", stderr);
}

#[test]
fn test_reconcile_from_image_paths() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_catalog(&config_path, &["reconcile", "--from-images"]);
    assert!(success, "reconcile failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("mapping entries: 1"), "stdout={}", stdout);
    assert!(stdout.contains("renamed: 1"));
    assert!(stdout.contains("extras removed: 0"));
    assert!(stdout.contains("placeholders: 2 / 3"));

    assert_eq!(
        asset_names(tmp.path()),
        vec![
            "01 COLOR&PERM SHAMPOO, CONDITIONER.webp".to_string(),
            "01 HARD SPRITZ - Amos Professional.jpg".to_string(),
            "product_578330.jpg".to_string(),
            "unsorted.png".to_string(),
        ]
    );
    let doc = catalog_json(tmp.path());
    assert_eq!(doc["products"][0]["image"], "Products/product_578330.jpg");

    let (_, _, success) = run_catalog(
        &config_path,
        &["reconcile", "--from-images", "--mapping", "x.toml"],
    );
    assert!(!success);
}

#[test]
fn test_repair_collapses_line_breaks() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_catalog(&config_path, &["repair"]);
    assert!(success, "repair failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("repaired: 1"));

    let doc = catalog_json(tmp.path());
    assert_eq!(doc["products"][0]["name"], "02 THE GREEN TEA Тослог хуйханд");

    let (stdout, _, _) = run_catalog(&config_path, &["repair"]);
    assert!(stdout.contains("repaired: 0"));
}

#[test]
fn test_check_fails_on_corrupt_catalog() {
    let (tmp, config_path) = setup_test_env();
    fs::write(tmp.path().join("data/products.json"), "{\"products\": [").unwrap();

    let (_, _, success) = run_catalog(&config_path, &["check"]);
    assert!(!success);
}

#[test]
fn test_scrape_transport_failure_is_a_warning() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("data/products.json")).unwrap();

    let (stdout, stderr, success) =
        run_catalog(&config_path, &["scrape", "--no-delay", "--progress", "off"]);
    assert!(success, "scrape failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("products found: 0"));
    assert!(stdout.contains("nothing to save"));
    assert!(stderr.contains("fetching page 1 failed"), "stderr={}", stderr);
    assert!(!tmp.path().join("data/products.json").exists());
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, _, success) = run_catalog(&tmp.path().join("absent.toml"), &["check"]);
    assert!(!success);
}
