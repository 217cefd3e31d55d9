//! Built-in evaluators, one per anomaly type.

mod data_integrity;
mod invalid_location;
mod location_mapping;
mod location_stagnant;
mod overcapacity;
mod stagnant;
mod temperature;
mod uncoordinated_lots;

pub use data_integrity::DataIntegrityEvaluator;
pub use invalid_location::InvalidLocationEvaluator;
pub use location_mapping::LocationMappingEvaluator;
pub use location_stagnant::LocationSpecificStagnantEvaluator;
pub use overcapacity::OvercapacityEvaluator;
pub use stagnant::StagnantPalletsEvaluator;
pub use temperature::TemperatureZoneEvaluator;
pub use uncoordinated_lots::UncoordinatedLotsEvaluator;

/// Formats hours with one decimal.
fn hours(value: f64) -> String {
    format!("{value:.1}h")
}
