// std imports
use std::collections::{BTreeMap, HashMap};

// 3rd party imports
use csv::StringRecord;

// local imports
use crate::{
    constants::{
        CACHE_ADDITIONAL_METRICS_COLUMN, CACHE_ADDITIONAL_METRICS_SEPARATOR,
        CACHE_ARRAY_SEPARATOR, CACHE_DATABASE_NAME_COLUMN, CACHE_ERRORS_COLUMN,
    },
    errors::cache_error::CacheError,
    metrics::metrics_record::{
        MetricValue, MetricsRecord, ARRAY_METRIC_NAMES, SCALAR_METRIC_NAMES,
    },
};

/// Translation between a metrics record and one row of the cache file.
/// Scalars are written as plain numbers (`NaN` if missing), arrays are joined
/// with [CACHE_ARRAY_SEPARATOR] in one column.
///
pub struct CacheEntry;

impl CacheEntry {
    /// Returns the cache header, the union of all well-known fields in stable order
    ///
    pub fn header() -> Vec<&'static str> {
        let mut header = Vec::with_capacity(SCALAR_METRIC_NAMES.len() + ARRAY_METRIC_NAMES.len() + 3);
        header.push(CACHE_DATABASE_NAME_COLUMN);
        header.extend_from_slice(SCALAR_METRIC_NAMES);
        header.extend_from_slice(ARRAY_METRIC_NAMES);
        header.push(CACHE_ADDITIONAL_METRICS_COLUMN);
        header.push(CACHE_ERRORS_COLUMN);
        header
    }

    /// Converts the record into a row matching [CacheEntry::header]
    ///
    /// # Arguments
    /// * `record` - Metrics record
    ///
    pub fn to_row(record: &MetricsRecord) -> Result<Vec<String>, CacheError> {
        if record.database_name().is_empty() {
            return Err(CacheError::EmptyDatabaseName);
        }
        let mut row = Vec::with_capacity(SCALAR_METRIC_NAMES.len() + ARRAY_METRIC_NAMES.len() + 3);
        row.push(record.database_name().to_string());
        for name in SCALAR_METRIC_NAMES {
            row.push(format_scalar(record.get_scalar(name)));
        }
        for name in ARRAY_METRIC_NAMES {
            row.push(format_array(record.get_array(name)));
        }
        row.push(format_additional_metrics(record.additional_metrics()));
        if record.errors().is_empty() {
            row.push(String::new());
        } else {
            row.push(serde_json::to_string(record.errors()).map_err(CacheError::ErrorsColumnError)?);
        }
        Ok(row)
    }

    /// Parses a row into a record
    ///
    /// # Arguments
    /// * `columns` - Column positions of the file's header
    /// * `row` - Row to parse
    ///
    pub fn from_row(columns: &CacheColumns, row: &StringRecord) -> Result<MetricsRecord, CacheError> {
        if row.len() != columns.column_count() {
            return Err(CacheError::ColumnCountMismatch(
                columns.column_count(),
                row.len(),
            ));
        }
        let database_name = columns
            .get(CACHE_DATABASE_NAME_COLUMN, row)
            .unwrap_or_default()
            .trim();
        if database_name.is_empty() {
            return Err(CacheError::EmptyDatabaseName);
        }

        let mut record = MetricsRecord::new(database_name.to_string());
        for name in SCALAR_METRIC_NAMES {
            if let Some(value) = columns.get(name, row) {
                record.set_metric(name, MetricValue::Scalar(parse_scalar(name, value)?));
            }
        }
        for name in ARRAY_METRIC_NAMES {
            if let Some(value) = columns.get(name, row) {
                record.set_metric(name, MetricValue::Array(parse_array(name, value)?));
            }
        }
        if let Some(value) = columns.get(CACHE_ADDITIONAL_METRICS_COLUMN, row) {
            record.apply_metrics(parse_additional_metrics(value)?);
        }
        if let Some(value) = columns.get(CACHE_ERRORS_COLUMN, row) {
            if !value.is_empty() {
                record.set_errors(serde_json::from_str(value).map_err(CacheError::ErrorsColumnError)?);
            }
        }
        Ok(record)
    }
}

/// Column positions within a cache file.
/// Columns unknown to the current schema are ignored, missing columns yield missing values.
///
pub struct CacheColumns {
    positions: HashMap<String, usize>,
    column_count: usize,
    matches_current_header: bool,
}

impl CacheColumns {
    /// Creates the column positions from a header row
    ///
    /// # Arguments
    /// * `header` - Header row of the cache file
    ///
    pub fn from_header(header: &StringRecord) -> Result<Self, CacheError> {
        let positions: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(idx, column)| (column.trim().to_string(), idx))
            .collect();
        if !positions.contains_key(CACHE_DATABASE_NAME_COLUMN) {
            return Err(CacheError::MissingColumn(CACHE_DATABASE_NAME_COLUMN));
        }
        let matches_current_header = header.iter().eq(CacheEntry::header());
        Ok(Self {
            positions,
            column_count: header.len(),
            matches_current_header,
        })
    }

    /// True if the file header is identical to the current header, so rows can be appended
    ///
    pub fn matches_current_header(&self) -> bool {
        self.matches_current_header
    }

    /// Number of columns every row must have
    ///
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    fn get<'a>(&self, column: &str, row: &'a StringRecord) -> Option<&'a str> {
        self.positions.get(column).and_then(|idx| row.get(*idx))
    }
}

fn format_scalar(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        value.to_string()
    }
}

fn format_array(values: &[f64]) -> String {
    values
        .iter()
        .map(|value| format_scalar(*value))
        .collect::<Vec<String>>()
        .join(&CACHE_ARRAY_SEPARATOR.to_string())
}

/// Formats additional metrics as `name=value|name=[v1;v2]`
fn format_additional_metrics(metrics: &BTreeMap<String, MetricValue>) -> String {
    metrics
        .iter()
        .map(|(name, value)| {
            let name = name.replace(
                |c: char| c == CACHE_ADDITIONAL_METRICS_SEPARATOR || c == '=',
                "_",
            );
            match value {
                MetricValue::Scalar(value) => format!("{}={}", name, format_scalar(*value)),
                MetricValue::Array(values) => format!("{}=[{}]", name, format_array(values)),
            }
        })
        .collect::<Vec<String>>()
        .join(&CACHE_ADDITIONAL_METRICS_SEPARATOR.to_string())
}

fn parse_scalar(column: &str, value: &str) -> Result<f64, CacheError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(f64::NAN);
    }
    value
        .parse::<f64>()
        .map_err(|_| CacheError::MalformedValue(column.to_string(), value.to_string()))
}

fn parse_array(column: &str, value: &str) -> Result<Vec<f64>, CacheError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(CACHE_ARRAY_SEPARATOR)
        .map(|element| parse_scalar(column, element))
        .collect()
}

fn parse_additional_metrics(value: &str) -> Result<BTreeMap<String, MetricValue>, CacheError> {
    let mut metrics = BTreeMap::new();
    if value.trim().is_empty() {
        return Ok(metrics);
    }
    for entry in value.split(CACHE_ADDITIONAL_METRICS_SEPARATOR) {
        let (name, value) = entry.split_once('=').ok_or_else(|| {
            CacheError::MalformedValue(CACHE_ADDITIONAL_METRICS_COLUMN.to_string(), entry.to_string())
        })?;
        let metric = match value.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')) {
            Some(inner) => MetricValue::Array(parse_array(name, inner)?),
            None => MetricValue::Scalar(parse_scalar(name, value)?),
        };
        metrics.insert(name.to_string(), metric);
    }
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_round_trip() {
        let mut record = MetricsRecord::new("db".to_string());
        record.set_target_psm_count(10.0);
        record.set_decoy_psm_scores(vec![0.5, 1.25, -3.0]);
        record.set_metric("ks_statistic_KS", MetricValue::Scalar(0.25));
        record.set_metric("custom_array", MetricValue::Array(vec![1.0, 2.0]));
        record.add_error("SomeCollector: broken; really".to_string());

        let header = StringRecord::from(CacheEntry::header());
        let columns = CacheColumns::from_header(&header).unwrap();
        assert!(columns.matches_current_header());

        let row = StringRecord::from(CacheEntry::to_row(&record).unwrap());
        let parsed = CacheEntry::from_row(&columns, &row).unwrap();

        assert_eq!(parsed.database_name(), "db");
        assert_eq!(parsed.target_psm_count(), 10.0);
        assert!(parsed.decoy_psm_count().is_nan());
        assert_eq!(parsed.decoy_psm_scores(), &[0.5, 1.25, -3.0]);
        assert!(parsed.unambiguous_psm_scores().is_empty());
        assert_eq!(parsed.get_scalar("ks_statistic_KS"), 0.25);
        assert_eq!(parsed.get_array("custom_array"), &[1.0, 2.0]);
        assert_eq!(parsed.errors(), record.errors());
        assert_eq!(CacheEntry::to_row(&parsed).unwrap(), CacheEntry::to_row(&record).unwrap());
    }

    #[test]
    fn test_missing_and_unknown_columns() {
        let header = StringRecord::from(vec!["database_name", "target_psm_count", "legacy"]);
        let columns = CacheColumns::from_header(&header).unwrap();
        assert!(!columns.matches_current_header());
        let row = StringRecord::from(vec!["db", "3", "whatever"]);
        let parsed = CacheEntry::from_row(&columns, &row).unwrap();
        assert_eq!(parsed.target_psm_count(), 3.0);
        assert!(parsed.database_size().is_nan());
    }

    #[test]
    fn test_malformed_values() {
        let header = StringRecord::from(CacheEntry::header());
        let columns = CacheColumns::from_header(&header).unwrap();
        let mut row = CacheEntry::to_row(&MetricsRecord::new("db".to_string())).unwrap();
        row[1] = "not-a-number".to_string();
        assert!(matches!(
            CacheEntry::from_row(&columns, &StringRecord::from(row)),
            Err(CacheError::MalformedValue(_, _))
        ));

        let mut empty_name = CacheEntry::to_row(&MetricsRecord::new("db".to_string())).unwrap();
        empty_name[0] = String::new();
        assert!(matches!(
            CacheEntry::from_row(&columns, &StringRecord::from(empty_name)),
            Err(CacheError::EmptyDatabaseName)
        ));

        assert!(CacheColumns::from_header(&StringRecord::from(vec!["name"])).is_err());
    }

    #[test]
    fn test_truncated_row_is_rejected() {
        let header = StringRecord::from(CacheEntry::header());
        let columns = CacheColumns::from_header(&header).unwrap();
        let mut record = MetricsRecord::new("db".to_string());
        record.set_database_size(1000.0);
        record.set_target_psm_count(10.0);
        let row = CacheEntry::to_row(&record).unwrap();

        let truncated = StringRecord::from(row[..2].to_vec());
        assert!(matches!(
            CacheEntry::from_row(&columns, &truncated),
            Err(CacheError::ColumnCountMismatch(expected, 2)) if expected == header.len()
        ));
    }
}
