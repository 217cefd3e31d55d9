//! Integration tests for column mapping against realistic export headers.

use warehouse_guard::mapping::{
    ColumnMapper, MappingDecisions, MappingStatus, MatchLayer, SemanticField, AUTO_APPLY_THRESHOLD,
};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_vendor_export_maps_through_synonyms() {
    let headers = [
        "LPN",
        "Current Location",
        "Received Date",
        "Lot",
        "Item Description",
        "Qty",
    ];
    let report = ColumnMapper::default().map_headers(&headers);

    assert_eq!(report.summary.auto_applied, 5);
    assert_eq!(report.unmatched_headers, vec!["Qty".to_string()]);
    for mapping in &report.mappings {
        assert!(approx(mapping.confidence, 0.88), "{:?}", mapping);
        assert_eq!(mapping.layer, Some(MatchLayer::Fuzzy));
    }

    let resolved = report.resolve(&MappingDecisions::default()).unwrap();
    assert_eq!(resolved.column_for(SemanticField::PalletId), Some("LPN"));
    assert_eq!(
        resolved.column_for(SemanticField::Location),
        Some("Current Location")
    );
    assert_eq!(resolved.column_for(SemanticField::ReceiptNumber), Some("Lot"));
}

#[test]
fn test_pallet_number_lands_in_auto_band() {
    let report = ColumnMapper::default().map_headers(&["Pallet number", "Location", "Created"]);
    let pallet = report.mapping(SemanticField::PalletId).unwrap();

    assert_eq!(pallet.column.as_deref(), Some("Pallet number"));
    assert!(pallet.confidence >= AUTO_APPLY_THRESHOLD && pallet.confidence <= 0.90);
    assert_eq!(pallet.status, MappingStatus::AutoApplied);
}

#[test]
fn test_spelling_variants_are_exact() {
    for header in ["PALLET_ID", "palletId", "Pallet-Id", "pallet id"] {
        let candidate = ColumnMapper::default()
            .score(SemanticField::PalletId, header)
            .unwrap();
        assert_eq!(candidate.layer, MatchLayer::Exact, "{header}");
        assert!(approx(candidate.confidence, 1.0), "{header}");
    }
}

#[test]
fn test_mapping_is_deterministic_and_order_independent() {
    let mapper = ColumnMapper::default();
    let headers = ["Pallet ID", "Loc", "Creation Date", "Batch", "Product"];
    let mut reversed = headers;
    reversed.reverse();

    let first = mapper.map_headers(&headers);
    assert_eq!(first, mapper.map_headers(&headers));

    let other = mapper.map_headers(&reversed);
    for field in [
        SemanticField::PalletId,
        SemanticField::Location,
        SemanticField::CreationDate,
        SemanticField::ReceiptNumber,
        SemanticField::Description,
    ] {
        assert_eq!(
            first.mapping(field).unwrap().column,
            other.mapping(field).unwrap().column,
            "{field}"
        );
    }
}

#[test]
fn test_weak_suggestion_needs_confirmation() {
    let report = ColumnMapper::default().map_headers(&["Pallet Ref", "Location", "Creation Date"]);
    let pallet = report.mapping(SemanticField::PalletId).unwrap();
    assert_eq!(pallet.status, MappingStatus::WeakSuggestion);
    assert_eq!(pallet.layer, Some(MatchLayer::Semantic));
    assert!(approx(pallet.confidence, 0.60));

    let err = report.resolve(&MappingDecisions::default()).unwrap_err();
    assert!(err.is_blocking());
    assert!(err.to_string().contains("pallet_id"));

    let resolved = report
        .resolve(&MappingDecisions::default().with_confirmed(SemanticField::PalletId))
        .unwrap();
    assert_eq!(resolved.column_for(SemanticField::PalletId), Some("Pallet Ref"));
}

#[test]
fn test_decisions_deserialize_from_json() {
    let decisions: MappingDecisions = serde_json::from_str(
        r#"{"manual": {"pallet_id": "Tag"}, "confirmed": ["creation_date"]}"#,
    )
    .unwrap();
    let report = ColumnMapper::default().map_headers(&["Tag", "Location", "Arrival Window"]);
    let resolved = report.resolve(&decisions).unwrap();

    assert_eq!(resolved.column_for(SemanticField::PalletId), Some("Tag"));
    assert_eq!(
        resolved.column_for(SemanticField::CreationDate),
        Some("Arrival Window")
    );
}
