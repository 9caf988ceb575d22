pub mod ports;
pub mod normalize_use_case;
pub mod consolidate_use_case;
pub mod enrich_use_case;
pub mod validate_use_case;
pub mod aggregate_use_case;
