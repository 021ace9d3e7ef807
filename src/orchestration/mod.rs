/// Screening configuration
pub mod configuration;
/// Search seam producing analysis contexts
pub mod database_search;
/// Worker pool and finalization
pub mod orchestrator;
/// Progress of the per-database phase
pub mod progress;
