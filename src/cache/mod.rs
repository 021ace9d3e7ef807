/// Row codec of the cache file
pub mod cache_entry;
/// Durable, concurrently usable cache of metrics records
pub mod result_cache;
