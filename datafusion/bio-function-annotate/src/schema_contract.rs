//! Column contracts for the variant table and the annotation sources.
//!
//! Defines the identifying variant columns, the payload columns each source
//! contributes, the fixed cCRE label vocabulary, and the final output column
//! order. Also reconciles that order against the columns a merge actually
//! produced.

use datafusion::arrow::datatypes::Schema;
use datafusion::common::{DataFusionError, Result};
use log::warn;

/// Identifying columns of a variant record, in file order.
pub const VARIANT_COLUMNS: &[&str] = &["chrom", "start", "end", "variant_id", "ref", "alt"];

/// Join key shared by the point-join sources.
pub const JOIN_KEY: &str = "variant_id";

/// Key column of the regulatory database before it is renamed to [`JOIN_KEY`].
pub const REGULATORY_KEY: &str = "ID";

/// Boolean payload columns of the regulatory database.
pub const REGULATORY_COLUMNS: &[&str] = &["ChIP", "Chromatin_accessibility", "QTL", "PWM"];

/// Score column of the pathogenicity table.
pub const PATHOGENICITY_COLUMN: &str = "am_pathogenicity";

/// Substring marking allele-frequency columns.
pub const AF_MARKER: &str = "AF_";

/// Columns of the headerless cCRE atlas file.
pub const CCRE_ATLAS_COLUMNS: &[&str] = &[
    "chrom",
    "start",
    "end",
    "accession1",
    "accession2",
    "cCRE_label",
];

/// Categorical label column of the cCRE atlas.
pub const CCRE_LABEL_COLUMN: &str = "cCRE_label";

/// Every cCRE label the output carries, whether or not the atlas window
/// produced it.
pub const CCRE_LABELS: &[&str] = &[
    "pELS",
    "CA-CTCF",
    "CA",
    "CA-TF",
    "dELS",
    "TF",
    "CA-H3K4me3",
    "PLS",
];

/// Whether `name` is an allele-frequency column for imputation purposes.
pub fn is_af_column(name: &str) -> bool {
    name.contains(AF_MARKER)
}

/// AF columns that take part in the output ordering, in schema order.
///
/// Only names starting with `AF_` are ordered; other names containing the
/// marker are imputed but fall out of the final projection.
pub fn discover_af_columns(schema: &Schema) -> Vec<String> {
    schema
        .fields()
        .iter()
        .map(|f| f.name())
        .filter(|name| name.starts_with(AF_MARKER))
        .cloned()
        .collect()
}

/// Label vocabulary in output order (byte-wise lexicographic).
pub fn sorted_ccre_labels() -> Vec<&'static str> {
    let mut labels = CCRE_LABELS.to_vec();
    labels.sort_unstable();
    labels
}

/// Expected column order of the final table: identifying columns, extra
/// variant columns, AF columns, regulatory columns, pathogenicity, then the
/// sorted cCRE labels.
pub fn expected_column_order(extra_columns: &[String], af_columns: &[String]) -> Vec<String> {
    VARIANT_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .chain(extra_columns.iter().cloned())
        .chain(af_columns.iter().cloned())
        .chain(REGULATORY_COLUMNS.iter().map(|s| s.to_string()))
        .chain(std::iter::once(PATHOGENICITY_COLUMN.to_string()))
        .chain(sorted_ccre_labels().into_iter().map(String::from))
        .collect()
}

/// Outcome of matching the expected column order against the columns a
/// table actually has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnReconciliation {
    /// Expected columns that are present, in expected order.
    pub selected: Vec<String>,
    /// Expected columns that are absent and will be omitted.
    pub missing: Vec<String>,
}

/// Intersect `expected` with `available`, keeping the expected order.
///
/// Absent expected columns are not an error. They are reported in
/// [`ColumnReconciliation::missing`] and logged.
pub fn reconcile_columns(expected: &[String], available: &[String]) -> ColumnReconciliation {
    let (selected, missing): (Vec<_>, Vec<_>) = expected
        .iter()
        .cloned()
        .partition(|name| available.contains(name));

    if !missing.is_empty() {
        warn!(
            "Omitting {} expected column(s) absent from the merged table: {}",
            missing.len(),
            missing.join(", ")
        );
    }

    ColumnReconciliation { selected, missing }
}

/// Validate that an annotation source exposes every required column.
pub fn validate_required_columns(schema: &Schema, required: &[&str], source: &str) -> Result<()> {
    for name in required {
        if schema.field_with_name(name).is_err() {
            let available: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
            return Err(DataFusionError::Plan(format!(
                "{source} is missing required column '{name}'. Available columns: {}",
                available.join(", ")
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::datatypes::{DataType, Field};

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn labels_sort_bytewise() {
        assert_eq!(
            sorted_ccre_labels(),
            vec!["CA", "CA-CTCF", "CA-H3K4me3", "CA-TF", "PLS", "TF", "dELS", "pELS"]
        );
    }

    #[test]
    fn expected_order() {
        let order = expected_column_order(&strings(&["is_coding"]), &strings(&["AF_eur", "AF_afr"]));
        assert_eq!(&order[..7], &strings(&["chrom", "start", "end", "variant_id", "ref", "alt", "is_coding"])[..]);
        assert_eq!(&order[7..9], &strings(&["AF_eur", "AF_afr"])[..]);
        assert_eq!(&order[9..13], &strings(REGULATORY_COLUMNS)[..]);
        assert_eq!(order[13], PATHOGENICITY_COLUMN);
        assert_eq!(order.len(), 14 + CCRE_LABELS.len());
        assert_eq!(order.last().map(String::as_str), Some("pELS"));
    }

    #[test]
    fn reconcile_keeps_expected_order_and_reports_missing() {
        let expected = strings(&["chrom", "start", "AF_eur", "QTL", "PLS"]);
        let available = strings(&["PLS", "start", "chrom", "extra_right", "QTL"]);
        let rec = reconcile_columns(&expected, &available);
        assert_eq!(rec.selected, strings(&["chrom", "start", "QTL", "PLS"]));
        assert_eq!(rec.missing, strings(&["AF_eur"]));
    }

    #[test]
    fn af_discovery_requires_prefix() {
        let schema = Schema::new(vec![
            Field::new("variant_id", DataType::Utf8, false),
            Field::new("AF_eur", DataType::Float64, true),
            Field::new("gnomAD_AF_nfe", DataType::Float64, true),
            Field::new("AF_afr", DataType::Float64, true),
        ]);
        assert_eq!(discover_af_columns(&schema), strings(&["AF_eur", "AF_afr"]));
        assert!(is_af_column("gnomAD_AF_nfe"));
        assert!(!is_af_column("variant_id"));
    }

    #[test]
    fn missing_required_column() {
        let schema = Schema::new(vec![Field::new("ID", DataType::Utf8, false)]);
        let err = validate_required_columns(&schema, &["ID", "QTL"], "regulatory database")
            .unwrap_err()
            .to_string();
        assert!(err.contains("regulatory database is missing required column 'QTL'"));
    }
}
