//! cCRE atlas loader: windowed read and label pivot.

use datafusion::arrow::array::{Array, AsArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::common::Result;
use datafusion::dataframe::DataFrame;
use datafusion::functions::core::expr_fn::coalesce;
use datafusion::functions_aggregate::expr_fn::bool_or;
use datafusion::prelude::{CsvReadOptions, Expr, SessionContext, cast, ident, lit};
use log::{debug, info};

use crate::parquet_io::file_extension;
use crate::schema_contract::{CCRE_ATLAS_COLUMNS, CCRE_LABEL_COLUMN};
use crate::variants::RegionWindow;

fn atlas_schema() -> Schema {
    Schema::new(
        CCRE_ATLAS_COLUMNS
            .iter()
            .map(|&name| {
                let dtype = match name {
                    "start" | "end" => DataType::Int64,
                    _ => DataType::Utf8,
                };
                Field::new(name, dtype, true)
            })
            .collect::<Vec<_>>(),
    )
}

/// Boolean fill for a label column: cast, then nulls become `false`.
pub(crate) fn label_flag(name: &str) -> Expr {
    coalesce(vec![cast(ident(name), DataType::Boolean), lit(false)]).alias(name)
}

/// Distinct non-null labels present in `df`, sorted.
async fn observed_labels(df: &DataFrame) -> Result<Vec<String>> {
    let batches = df
        .clone()
        .select(vec![cast(ident(CCRE_LABEL_COLUMN), DataType::Utf8).alias(CCRE_LABEL_COLUMN)])?
        .distinct()?
        .collect()
        .await?;

    let mut labels = Vec::new();
    for batch in &batches {
        let column = batch.column(0).as_string::<i32>();
        for i in 0..column.len() {
            if column.is_valid(i) {
                labels.push(column.value(i).to_string());
            }
        }
    }
    labels.sort_unstable();
    Ok(labels)
}

/// Read the headerless six-column atlas, keep the elements strictly inside
/// `window`, and pivot `cCRE_label` into one Boolean flag per observed label.
///
/// The result has one row per distinct `(chrom, start, end)`. Labels that do
/// not occur inside the window get no column.
pub async fn read_ccre_atlas(
    ctx: &SessionContext,
    path: &str,
    window: &RegionWindow,
) -> Result<DataFrame> {
    let schema = atlas_schema();
    let ext = file_extension(path);
    let options = CsvReadOptions::new()
        .delimiter(b'\t')
        .has_header(false)
        .file_extension(&ext)
        .schema(&schema);

    let filtered = ctx.read_csv(path, options).await?.filter(
        ident("chrom")
            .eq(lit(window.chrom.as_str()))
            .and(ident("start").gt(lit(window.min_position)))
            .and(ident("end").lt(lit(window.max_position))),
    )?;

    let labels = observed_labels(&filtered).await?;
    info!(
        "cCRE atlas window {}:{}-{} has {} label(s): {}",
        window.chrom,
        window.min_position,
        window.max_position,
        labels.len(),
        labels.join(", ")
    );

    let presence = labels
        .iter()
        .map(|label| bool_or(ident(CCRE_LABEL_COLUMN).eq(lit(label.as_str()))).alias(label))
        .collect::<Vec<_>>();
    let keys = vec![ident("chrom"), ident("start"), ident("end")];

    let pivoted = if presence.is_empty() {
        filtered.select(keys)?
    } else {
        filtered.aggregate(keys, presence)?
    };

    let projection = ["chrom", "start", "end"]
        .into_iter()
        .map(ident)
        .chain(labels.iter().map(|label| label_flag(label)))
        .collect::<Vec<_>>();
    debug!("Pivoted cCRE atlas into {} label column(s)", labels.len());

    pivoted.select(projection)?.distinct()
}
