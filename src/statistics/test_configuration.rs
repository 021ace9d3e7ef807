// 3rd party imports
use serde::{Deserialize, Serialize};

use super::{
    fisher_exact_test::FisherExactTest,
    gaussian_test::GaussianTest,
    kolmogorov_smirnov_test::KolmogorovSmirnovTest,
    negative_binomial_test::NegativeBinomialTest,
    permutation_test::PermutationTest,
    statistical_test::{SkipPredicate, StatisticalTest, TailDirection, TestDescriptor, ValueExtractor},
};

fn default_description() -> String {
    String::new()
}

fn default_weight_metric() -> String {
    "database_size".to_string()
}

fn default_iterations() -> usize {
    10_000
}

fn default_seed() -> u64 {
    42
}

fn default_true() -> bool {
    true
}

fn default_min_sample_size() -> usize {
    10
}

/// Serializable description of one statistical test, e.g.
///
/// ```toml
/// [[statistics.tests]]
/// type = "gaussian"
/// name = "UnambiguousPsmRatio"
/// extractor = { ratio = { numerator = "unambiguous_psm_count", denominator = "target_psm_count" } }
/// ```
///
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestConfiguration {
    Gaussian {
        name: String,
        #[serde(default = "default_description")]
        description: String,
        extractor: ValueExtractor,
        #[serde(default)]
        skip: SkipPredicate,
        #[serde(default)]
        tail: TailDirection,
    },
    NegativeBinomial {
        name: String,
        #[serde(default = "default_description")]
        description: String,
        extractor: ValueExtractor,
        /// Metric to normalize the counts by
        #[serde(default)]
        size_metric: Option<String>,
        #[serde(default)]
        skip: SkipPredicate,
        #[serde(default)]
        tail: TailDirection,
    },
    Permutation {
        name: String,
        #[serde(default = "default_description")]
        description: String,
        extractor: ValueExtractor,
        #[serde(default = "default_weight_metric")]
        weight_metric: String,
        #[serde(default = "default_iterations")]
        iterations: usize,
        #[serde(default = "default_seed")]
        seed: u64,
        #[serde(default = "default_true")]
        discrete: bool,
        #[serde(default)]
        skip: SkipPredicate,
        #[serde(default)]
        tail: TailDirection,
    },
    KolmogorovSmirnov {
        name: String,
        #[serde(default = "default_description")]
        description: String,
        background_metric: String,
        sample_metric: String,
        #[serde(default = "default_min_sample_size")]
        min_sample_size: usize,
        #[serde(default)]
        skip: SkipPredicate,
        #[serde(default)]
        tail: TailDirection,
    },
    FisherExact {
        name: String,
        #[serde(default = "default_description")]
        description: String,
        successes_metric: String,
        failures_metric: String,
        #[serde(default)]
        skip: SkipPredicate,
        #[serde(default)]
        tail: TailDirection,
    },
}

impl TestConfiguration {
    /// Name of the configured test
    ///
    pub fn name(&self) -> &str {
        match self {
            TestConfiguration::Gaussian { name, .. }
            | TestConfiguration::NegativeBinomial { name, .. }
            | TestConfiguration::Permutation { name, .. }
            | TestConfiguration::KolmogorovSmirnov { name, .. }
            | TestConfiguration::FisherExact { name, .. } => name,
        }
    }

    /// Creates the test
    ///
    pub fn build(&self) -> Box<dyn StatisticalTest> {
        match self.clone() {
            TestConfiguration::Gaussian {
                name,
                description,
                extractor,
                skip,
                tail,
            } => Box::new(GaussianTest::new(
                TestDescriptor::new(&name, &description, extractor).with_skip_predicate(skip),
                tail,
            )),
            TestConfiguration::NegativeBinomial {
                name,
                description,
                extractor,
                size_metric,
                skip,
                tail,
            } => Box::new(NegativeBinomialTest::new(
                TestDescriptor::new(&name, &description, extractor).with_skip_predicate(skip),
                tail,
                size_metric,
            )),
            TestConfiguration::Permutation {
                name,
                description,
                extractor,
                weight_metric,
                iterations,
                seed,
                discrete,
                skip,
                tail,
            } => Box::new(PermutationTest::new(
                TestDescriptor::new(&name, &description, extractor).with_skip_predicate(skip),
                tail,
                weight_metric,
                iterations,
                seed,
                discrete,
            )),
            TestConfiguration::KolmogorovSmirnov {
                name,
                description,
                background_metric,
                sample_metric,
                min_sample_size,
                skip,
                tail,
            } => Box::new(
                KolmogorovSmirnovTest::new(
                    &name,
                    &description,
                    &background_metric,
                    &sample_metric,
                    tail,
                    min_sample_size,
                )
                .with_skip_predicate(skip),
            ),
            TestConfiguration::FisherExact {
                name,
                description,
                successes_metric,
                failures_metric,
                skip,
                tail,
            } => Box::new(
                FisherExactTest::new(&name, &description, &successes_metric, &failures_metric, tail)
                    .with_skip_predicate(skip),
            ),
        }
    }

    /// Creates all configured tests
    ///
    pub fn build_all(configurations: &[TestConfiguration]) -> Vec<Box<dyn StatisticalTest>> {
        configurations.iter().map(|configuration| configuration.build()).collect()
    }

    /// Default battery with one test of each kind, all looking for an excess of
    /// identifications specific to the transient database
    ///
    pub fn default_roster() -> Vec<TestConfiguration> {
        vec![
            TestConfiguration::Gaussian {
                name: "UnambiguousPsmRatio".to_string(),
                description: "Fraction of unambiguous target PSMs against a normal distribution over all databases".to_string(),
                extractor: ValueExtractor::ratio("unambiguous_psm_count", "target_psm_count"),
                skip: SkipPredicate::default(),
                tail: TailDirection::Upper,
            },
            TestConfiguration::NegativeBinomial {
                name: "UnambiguousPsmCount".to_string(),
                description: "Unambiguous target PSMs, normalized by database size, against a negative binomial distribution".to_string(),
                extractor: ValueExtractor::metric("unambiguous_psm_count"),
                size_metric: Some("database_size".to_string()),
                skip: SkipPredicate::default(),
                tail: TailDirection::Upper,
            },
            TestConfiguration::Permutation {
                name: "UnambiguousPsmPermutation".to_string(),
                description: "Unambiguous target PSMs redistributed across databases proportional to their size".to_string(),
                extractor: ValueExtractor::metric("unambiguous_psm_count"),
                weight_metric: default_weight_metric(),
                iterations: default_iterations(),
                seed: default_seed(),
                discrete: true,
                skip: SkipPredicate::default(),
                tail: TailDirection::Upper,
            },
            TestConfiguration::KolmogorovSmirnov {
                name: "UnambiguousScoreDistribution".to_string(),
                description: "Scores of unambiguous target PSMs against the pooled decoy scores".to_string(),
                background_metric: "decoy_psm_scores".to_string(),
                sample_metric: "unambiguous_psm_scores".to_string(),
                min_sample_size: default_min_sample_size(),
                skip: SkipPredicate::default(),
                tail: TailDirection::Upper,
            },
            TestConfiguration::FisherExact {
                name: "UnambiguousPsmEnrichment".to_string(),
                description: "Unambiguous vs. ambiguous target PSMs compared to all other databases".to_string(),
                successes_metric: "unambiguous_psm_count".to_string(),
                failures_metric: "ambiguous_psm_count".to_string(),
                skip: SkipPredicate::default(),
                tail: TailDirection::Upper,
            },
        ]
    }
}
