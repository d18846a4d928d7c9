use datafusion::common::Result;
use datafusion::dataframe::DataFrame;
use datafusion::prelude::{Expr, ident, lit};
use log::{debug, info};

use crate::ccre::label_flag;
use crate::schema_contract::{CCRE_LABELS, expected_column_order, reconcile_columns};

/// Bring a fully merged table into its output shape.
///
/// All cCRE labels are present as non-null Boolean columns (absent labels
/// become all-`false`), exact duplicate rows are collapsed, rows are sorted by
/// `start`, and columns follow [`expected_column_order`]. Expected columns the
/// table does not have are left out.
pub fn finalize(
    df: DataFrame,
    extra_columns: &[String],
    af_columns: &[String],
) -> Result<DataFrame> {
    let present: Vec<String> = df
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    let mut projection: Vec<Expr> = present
        .iter()
        .map(|name| {
            if CCRE_LABELS.contains(&name.as_str()) {
                label_flag(name)
            } else {
                ident(name)
            }
        })
        .collect();
    let absent: Vec<&str> = CCRE_LABELS
        .iter()
        .copied()
        .filter(|label| !present.iter().any(|p| p == label))
        .collect();
    if !absent.is_empty() {
        debug!("Adding all-false label column(s): {}", absent.join(", "));
    }
    projection.extend(absent.iter().map(|&label| lit(false).alias(label)));

    let df = df
        .select(projection)?
        .distinct()?
        .sort(vec![ident("start").sort(true, false)])?;

    let available: Vec<String> = df
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let expected = expected_column_order(extra_columns, af_columns);
    let reconciliation = reconcile_columns(&expected, &available);
    info!(
        "Final table has {} column(s); {} expected column(s) missing",
        reconciliation.selected.len(),
        reconciliation.missing.len()
    );

    df.select(reconciliation.selected.iter().map(ident).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::datatypes::DataType;
    use datafusion::assert_batches_eq;
    use datafusion::prelude::SessionContext;

    const MERGED: &str = r#"
        SELECT * FROM (VALUES
            ('chr1', 900, 950, 'v3', 'C', 'G', CAST(NULL AS BOOLEAN), 0.5, 'x'),
            ('chr1', 100, 200, 'v1', 'A', 'C', true, 0.1, 'x'),
            ('chr1', 100, 200, 'v1', 'A', 'C', true, 0.1, 'x'),
            ('chr1', 150, 250, 'v2', 'G', 'T', false, 0.2, 'x')
        ) AS t(chrom, "start", "end", variant_id, "ref", alt, "PLS", am_pathogenicity, scratch)
    "#;

    #[tokio::test(flavor = "multi_thread")]
    async fn shape_order_and_dedup() -> Result<()> {
        let ctx = SessionContext::new();
        let df = finalize(ctx.sql(MERGED).await?, &[], &["AF_eur".to_string()])?;

        let names: Vec<_> = df.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(
            names,
            [
                "chrom", "start", "end", "variant_id", "ref", "alt", "am_pathogenicity", "CA",
                "CA-CTCF", "CA-H3K4me3", "CA-TF", "PLS", "TF", "dELS", "pELS"
            ]
        );
        for label in CCRE_LABELS {
            let field = df.schema().field_with_unqualified_name(label)?;
            assert_eq!(field.data_type(), &DataType::Boolean);
        }

        let expected = [
            "+-------+-------+-----+------------+-----+-----+------------------+-------+---------+------------+-------+-------+-------+-------+-------+",
            "| chrom | start | end | variant_id | ref | alt | am_pathogenicity | CA    | CA-CTCF | CA-H3K4me3 | CA-TF | PLS   | TF    | dELS  | pELS  |",
            "+-------+-------+-----+------------+-----+-----+------------------+-------+---------+------------+-------+-------+-------+-------+-------+",
            "| chr1  | 100   | 200 | v1         | A   | C   | 0.1              | false | false   | false      | false | true  | false | false | false |",
            "| chr1  | 150   | 250 | v2         | G   | T   | 0.2              | false | false   | false      | false | false | false | false | false |",
            "| chr1  | 900   | 950 | v3         | C   | G   | 0.5              | false | false   | false      | false | false | false | false | false |",
            "+-------+-------+-----+------------+-----+-----+------------------+-------+---------+------------+-------+-------+-------+-------+-------+",
        ];
        assert_batches_eq!(expected, &df.collect().await?);
        Ok(())
    }
}
