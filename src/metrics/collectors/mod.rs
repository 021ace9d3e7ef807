/// Fragment ion quality
pub mod fragment_ion_collector;
/// Target/decoy counts at the FDR threshold
pub mod identification_count_collector;
/// Organism specificity of the identifications
pub mod organism_specificity_collector;
/// Retention time error summaries
pub mod retention_time_collector;
