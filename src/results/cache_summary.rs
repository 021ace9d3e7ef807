/// Cache state of a set of requested databases
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSummary {
    /// Requested databases which are already cached
    pub cached: Vec<String>,
    /// Requested databases which still need processing
    pub needs_processing: Vec<String>,
}

impl CacheSummary {
    /// Number of requested databases
    ///
    pub fn total(&self) -> usize {
        self.cached.len() + self.needs_processing.len()
    }

    pub fn cached_count(&self) -> usize {
        self.cached.len()
    }

    pub fn needs_processing_count(&self) -> usize {
        self.needs_processing.len()
    }

    /// True if every requested database is cached
    ///
    pub fn is_fully_cached(&self) -> bool {
        self.needs_processing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let summary = CacheSummary {
            cached: vec!["a".to_string(), "b".to_string()],
            needs_processing: vec!["c".to_string()],
        };
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.cached_count(), 2);
        assert_eq!(summary.needs_processing_count(), 1);
        assert!(!summary.is_fully_cached());
    }
}
