//! End-to-end tests: raw export rows through mapping, resolution, rules and
//! formatting.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use warehouse_guard::core::{AnomalyType, Priority, RawRow, RuleCategory, WarningKind};
use warehouse_guard::engine::{AnalysisRequest, AnomalyEngine, EngineConfig, WarehouseContext};
use warehouse_guard::error::{Result, WarehouseError};
use warehouse_guard::formatters::{
    FormatterConfig, HumanFormatter, JsonFormatter, MarkdownFormatter, ReportFormatter,
};
use warehouse_guard::location::{
    LocationCategory, LocationRegistry, NamedArea, RegistryEntry, WarehouseConfig,
};
use warehouse_guard::mapping::{MappingDecisions, SemanticField};
use warehouse_guard::rules::RuleDefinition;

fn lot_export() -> Vec<RawRow> {
    let mut rows = Vec::with_capacity(700);
    for n in 0..690 {
        let receipt = format!("RCPT-{:03}", n / 10);
        rows.push(common::row(
            &format!("PLT-{n:05}"),
            &common::slot(n),
            2,
            Some(&receipt),
        ));
    }
    for n in 0..10 {
        let location = if n < 8 {
            common::slot(690 + n)
        } else {
            "RECV-01".to_string()
        };
        rows.push(common::row(
            &format!("PLT-LOT-{n:02}"),
            &location,
            2,
            Some("RCPT-LATE"),
        ));
    }
    rows
}

fn request(rows: Vec<RawRow>) -> AnalysisRequest {
    AnalysisRequest::new(common::headers(), rows).with_reference_time(common::reference_time())
}

#[tokio::test]
async fn test_lot_stragglers_among_700_pallets() {
    let engine = AnomalyEngine::default();
    let context = WarehouseContext::new(WarehouseConfig::new("WH01"));

    let report = engine.analyze(request(lot_export()), &context).await.unwrap();

    assert_eq!(report.summary.total_records, 700);
    assert_eq!(report.summary.invalid_locations, 0);
    assert_eq!(report.anomalies.len(), 2);
    for anomaly in &report.anomalies {
        assert_eq!(anomaly.anomaly_type, AnomalyType::UncoordinatedLots);
        assert_eq!(anomaly.location, "RECV-01");
        assert!(anomaly.unit_id.starts_with("PLT-LOT-"));
    }
}

#[tokio::test]
async fn test_parallel_and_sequential_runs_agree() {
    let context = WarehouseContext::new(WarehouseConfig::new("WH01"));
    let rows = vec![
        common::row("P-1", "1230A", 1, None),
        common::row("P-2", "1230A", 1, None),
        common::row("P-3", "RECV-01", 40, None),
        common::row("P-4", "AISLE-03", 12, None),
        common::row("P-5", "NOWHERE", 1, None),
    ];

    let parallel = AnomalyEngine::builder()
        .with_config(EngineConfig::default().with_max_concurrency(8))
        .build()
        .analyze(request(rows.clone()), &context)
        .await
        .unwrap();
    let sequential = AnomalyEngine::builder()
        .with_config(EngineConfig::sequential())
        .build()
        .analyze(request(rows), &context)
        .await
        .unwrap();

    assert_eq!(parallel.anomalies, sequential.anomalies);
    assert_eq!(parallel.summary.anomalies, sequential.summary.anomalies);
    assert!(!parallel.anomalies.is_empty());
}

#[tokio::test]
async fn test_one_anomaly_per_pallet() {
    let context = WarehouseContext::new(WarehouseConfig::new("WH01"));
    // P-1 is both in an overfull slot and a duplicate scan
    let rows = vec![
        common::row("P-1", "100A", 1, None),
        common::row("P-2", "100A", 1, None),
        common::row("P-1", "101A", 1, None),
    ];

    let report = AnomalyEngine::default()
        .analyze(request(rows), &context)
        .await
        .unwrap();

    let p1: Vec<_> = report
        .anomalies
        .iter()
        .filter(|a| a.claimed_units().contains(&"P-1"))
        .collect();
    assert_eq!(p1.len(), 1);
    assert_eq!(p1[0].anomaly_type, AnomalyType::DataIntegrity);

    // the slot is still overfull, reported through the other pallet
    let slot: Vec<_> = report.anomalies_of(AnomalyType::Overcapacity).collect();
    assert_eq!(slot.len(), 1);
    assert_eq!(slot[0].unit_id, "P-2");
    assert_eq!(slot[0].affected_count, 1);
    assert_eq!(report.summary.narrowed, 1);
    assert_eq!(
        report.summary.candidates,
        report.anomalies.len() + report.summary.suppressed
    );
}

#[tokio::test]
async fn test_overfull_slot_survives_duplicate_scan() {
    let context = WarehouseContext::new(WarehouseConfig::new("WH01"));
    let mut rows: Vec<RawRow> = (0..10)
        .map(|i| common::row(&format!("P-{i}"), "1230A", 1, None))
        .collect();
    rows.push(common::row("P-0", "1231A", 1, None));

    let report = AnomalyEngine::default()
        .analyze(request(rows), &context)
        .await
        .unwrap();

    assert_eq!(report.anomalies.len(), 2);
    let integrity: Vec<_> = report.anomalies_of(AnomalyType::DataIntegrity).collect();
    assert_eq!(integrity.len(), 1);
    assert_eq!(integrity[0].unit_id, "P-0");

    let capacity: Vec<_> = report.anomalies_of(AnomalyType::Overcapacity).collect();
    assert_eq!(capacity.len(), 1);
    assert_eq!(capacity[0].location, "1230A");
    assert_eq!(capacity[0].affected_count, 9);
    assert_ne!(capacity[0].unit_id, "P-0");
}

#[tokio::test]
async fn test_overfull_staging_is_not_also_stagnant() {
    let context = WarehouseContext::new(WarehouseConfig::new("WH01"));
    let rules = vec![
        RuleDefinition::new(
            "overcapacity",
            "Overloaded locations",
            AnomalyType::Overcapacity,
            RuleCategory::Space,
            Priority::High,
        ),
        RuleDefinition::new(
            "staging-stagnant",
            "Stuck in staging",
            AnomalyType::StagnantPallets,
            RuleCategory::FlowTime,
            Priority::Medium,
        )
        .with_conditions(json!({"location_types": ["STAGING"]})),
    ];
    let rows: Vec<RawRow> = (0..8)
        .map(|i| common::row(&format!("P-{i}"), "STAGE-01", 10, None))
        .collect();

    let report = AnomalyEngine::default()
        .analyze(request(rows).with_rules(rules), &context)
        .await
        .unwrap();

    assert_eq!(report.anomalies.len(), 1);
    assert_eq!(report.anomalies[0].anomaly_type, AnomalyType::Overcapacity);
    assert_eq!(report.anomalies[0].affected_count, 8);
    assert_eq!(report.summary.suppressed, 8);
    assert_eq!(report.anomalies_of(AnomalyType::StagnantPallets).count(), 0);
}

#[tokio::test]
async fn test_custom_rules_and_thresholds() {
    let context = WarehouseContext::new(WarehouseConfig::new("WH01"));
    let rules = vec![RuleDefinition::new(
        "slow-receiving",
        "Slow receiving",
        AnomalyType::StagnantPallets,
        RuleCategory::FlowTime,
        Priority::Low,
    )
    .with_conditions(json!({"time_threshold_hours": 48, "location_types": ["RECEIVING"]}))];
    let rows = vec![
        common::row("P-1", "RECV-01", 30, None),
        common::row("P-2", "RECV-01", 50, None),
    ];

    let report = AnomalyEngine::default()
        .analyze(request(rows).with_rules(rules), &context)
        .await
        .unwrap();

    assert_eq!(report.anomalies.len(), 1);
    assert_eq!(report.anomalies[0].unit_id, "P-2");
    assert_eq!(report.rule_performance.len(), 1);
    assert_eq!(report.rule_performance[0].retained, 1);
}

#[tokio::test]
async fn test_rejected_rule_is_reported_and_others_run() {
    let context = WarehouseContext::new(WarehouseConfig::new("WH01"));
    let mut rules = RuleDefinition::default_rules();
    rules[0] = rules[0]
        .clone()
        .with_conditions(json!({"time_threshold_hours": -3}));

    let report = AnomalyEngine::default()
        .analyze(
            request(vec![
                common::row("P-1", "200A", 1, None),
                common::row("P-2", "200A", 1, None),
            ])
            .with_rules(rules),
            &context,
        )
        .await
        .unwrap();

    assert!(report
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::RuleRejected
            && w.rule_id.as_deref() == Some("stagnant-pallets")));
    assert_eq!(report.anomalies_of(AnomalyType::Overcapacity).count(), 1);
}

#[tokio::test]
async fn test_manual_mapping_unblocks_analysis() {
    let headers = vec![
        "Tag".to_string(),
        "Location".to_string(),
        "Creation Date".to_string(),
    ];
    let rows: Vec<_> = (0..3)
        .map(|n| {
            let mut row = common::row(&format!("P-{n}"), "300A", 1, None);
            let pallet = row.remove("Pallet ID").unwrap();
            row.insert("Tag".to_string(), pallet);
            row
        })
        .collect();
    let context = WarehouseContext::new(WarehouseConfig::new("WH01"));
    let engine = AnomalyEngine::default();

    let blocked = engine
        .analyze(
            AnalysisRequest::new(headers.clone(), rows.clone())
                .with_reference_time(common::reference_time()),
            &context,
        )
        .await
        .unwrap_err();
    assert!(matches!(blocked, WarehouseError::IncompleteMapping { .. }));

    let report = engine
        .analyze(
            AnalysisRequest::new(headers, rows)
                .with_decisions(
                    MappingDecisions::default().with_manual(SemanticField::PalletId, "Tag"),
                )
                .with_reference_time(common::reference_time()),
            &context,
        )
        .await
        .unwrap();
    assert_eq!(report.summary.total_records, 3);
    assert_eq!(report.anomalies_of(AnomalyType::Overcapacity).count(), 1);
    assert_eq!(report.anomalies[0].affected_count, 3);
}

#[derive(Debug)]
struct UnreachableRegistry;

#[async_trait]
impl LocationRegistry for UnreachableRegistry {
    async fn load_locations(&self, _warehouse_id: &str) -> Result<Vec<RegistryEntry>> {
        Err(WarehouseError::registry("database is offline"))
    }
}

#[tokio::test]
async fn test_registry_failure_aborts_run() {
    let context = WarehouseContext::new(WarehouseConfig::new("WH01"))
        .with_registry(Arc::new(UnreachableRegistry));

    let err = AnomalyEngine::default()
        .analyze(request(vec![common::row("P-1", "1A", 1, None)]), &context)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("WH01"));
}

#[tokio::test]
async fn test_declared_areas_drive_capacity() {
    let config = WarehouseConfig::new("WH01")
        .with_named_area(NamedArea::new("DOCK-1", LocationCategory::Dock, 2));
    let context = WarehouseContext::new(config);
    let rows = vec![
        common::row("P-1", "DOCK-1", 1, None),
        common::row("P-2", "dock-1", 1, None),
        common::row("P-3", " DOCK-1 ", 1, None),
    ];

    let report = AnomalyEngine::default()
        .analyze(request(rows), &context)
        .await
        .unwrap();

    let over: Vec<_> = report.anomalies_of(AnomalyType::Overcapacity).collect();
    assert_eq!(over.len(), 1);
    assert_eq!(over[0].affected_count, 3);
    assert_eq!(report.summary.distinct_locations, 1);
}

#[tokio::test]
async fn test_report_renders_in_every_format() {
    let context = WarehouseContext::new(WarehouseConfig::new("WH01"));
    let report = AnomalyEngine::default()
        .analyze(
            request(vec![
                common::row("P-1", "400A", 1, None),
                common::row("P-2", "400A", 1, None),
                common::row("P-3", "RECV-02", 30, None),
            ]),
            &context,
        )
        .await
        .unwrap();

    let json = JsonFormatter::new().format(&report).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["warehouse_id"], "WH01");
    assert_eq!(
        parsed["anomalies"].as_array().unwrap().len(),
        report.anomalies.len()
    );

    let human = HumanFormatter::with_config(FormatterConfig::default().with_colors(false))
        .format(&report)
        .unwrap();
    assert!(human.contains("anomalies found"));
    assert!(human.contains("P-3"));

    let markdown = MarkdownFormatter::new().format(&report).unwrap();
    assert!(markdown.contains("Inventory Anomaly Report"));
    assert!(markdown.contains("| "));

    let ci = HumanFormatter::with_config(FormatterConfig::ci().with_max_anomalies(1))
        .format(&report)
        .unwrap();
    assert!(ci.contains("more anomal"));
}
