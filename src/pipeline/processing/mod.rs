// Pipeline processing: normalization, consolidation, enrichment, validation, aggregation

pub mod aggregate;
pub mod consolidate;
pub mod enrich;
pub mod normalize;
pub mod quality_gate;
pub mod tabular;
