//! Generate sample inventory exports for demos and manual testing.
//!
//! Writes JSON files with a header row and export rows that can be fed to
//! `AnomalyEngine::analyze`, plus the matching warehouse configuration.

use std::path::Path;

use serde_json::json;
use tracing::info;
use warehouse_guard::logging::setup::{init_subscriber, SubscriberConfig};
use warehouse_guard::rules::RuleDefinition;
use warehouse_guard::test_fixtures::{
    anomaly_showcase_rows, export_headers, lot_straggler_rows, random_inventory,
    sample_warehouse, to_rows,
};

const SEED: u64 = 42;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_subscriber(SubscriberConfig::cli())?;
    println!("Generating inventory fixtures...");

    let fixtures_dir = Path::new("fixtures");
    if !fixtures_dir.exists() {
        std::fs::create_dir_all(fixtures_dir)?;
    }

    let exports = [
        ("showcase", anomaly_showcase_rows()),
        ("lot_stragglers", lot_straggler_rows()),
        ("random_1k", to_rows(&random_inventory(1_000, SEED))),
        ("random_10k", to_rows(&random_inventory(10_000, SEED))),
    ];

    for (name, rows) in exports {
        let output_path = fixtures_dir.join(format!("{name}.json"));
        let count = rows.len();
        println!("  Writing {count} rows to {output_path:?}");
        let document = json!({
            "headers": export_headers(),
            "rows": rows,
        });
        std::fs::write(&output_path, serde_json::to_string_pretty(&document)?)?;
        info!(fixture = name, rows = count, "Fixture written");
    }

    let config_path = fixtures_dir.join("warehouse.json");
    println!("  Writing warehouse configuration to {config_path:?}");
    std::fs::write(&config_path, serde_json::to_string_pretty(&sample_warehouse())?)?;

    let rules_path = fixtures_dir.join("rules.json");
    println!("  Writing default rules to {rules_path:?}");
    std::fs::write(
        &rules_path,
        serde_json::to_string_pretty(&RuleDefinition::default_rules())?,
    )?;

    println!("Fixtures generated successfully!");
    Ok(())
}
