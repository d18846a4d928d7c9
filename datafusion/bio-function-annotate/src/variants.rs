//! Region variant table: header discovery, typed load, and filter window.

use std::fs::File;
use std::io::{BufRead, BufReader};

use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::common::{DataFusionError, Result, ScalarValue};
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::{max, min};
use datafusion::prelude::{CsvReadOptions, SessionContext, cast, ident};
use log::debug;

use crate::parquet_io::file_extension;
use crate::schema_contract::VARIANT_COLUMNS;

/// Genomic window the cCRE atlas is restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionWindow {
    pub chrom: String,
    pub min_position: i64,
    pub max_position: i64,
}

fn first_line(path: &str) -> Result<String> {
    let mut line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut line)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Column names of a variant file.
///
/// The first line carries the header, optionally `#`-prefixed. Empty names
/// are dropped and a leading run of the identifying columns is not repeated,
/// so the result is always the identifying columns followed by the extra
/// columns in file order.
pub fn read_variant_headers(path: &str) -> Result<Vec<String>> {
    let line = first_line(path)?;
    let names: Vec<&str> = line
        .trim_start_matches('#')
        .split('\t')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();

    let extras = if names.len() >= VARIANT_COLUMNS.len()
        && names[..VARIANT_COLUMNS.len()] == *VARIANT_COLUMNS
    {
        &names[VARIANT_COLUMNS.len()..]
    } else {
        &names[..]
    };

    let headers: Vec<String> = VARIANT_COLUMNS
        .iter()
        .copied()
        .chain(extras.iter().copied())
        .map(String::from)
        .collect();
    debug!("Variant file {path} has columns: {}", headers.join(", "));
    Ok(headers)
}

fn is_identifying(name: &str) -> bool {
    VARIANT_COLUMNS.contains(&name)
}

/// Read schema of the variant file: identifying columns keep their natural
/// types, every extra column is parsed as an integer.
fn variant_file_schema(headers: &[String]) -> Schema {
    Schema::new(
        headers
            .iter()
            .map(|name| {
                let dtype = match name.as_str() {
                    "start" | "end" => DataType::Int64,
                    n if is_identifying(n) => DataType::Utf8,
                    _ => DataType::Int64,
                };
                Field::new(name, dtype, true)
            })
            .collect::<Vec<_>>(),
    )
}

/// Lazily read a tab-separated variant file with the given column names.
///
/// `#` lines are comments. A header line without `#` is skipped as a header
/// row. Extra columns are cast to `Int8`; a column-count mismatch or a value
/// that does not fit surfaces as an error when the plan executes.
pub async fn read_variant_table(
    ctx: &SessionContext,
    path: &str,
    headers: &[String],
) -> Result<DataFrame> {
    for required in VARIANT_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(DataFusionError::Plan(format!(
                "variant headers are missing identifying column '{required}'"
            )));
        }
    }

    let has_header_row = !first_line(path)?.starts_with('#');
    let schema = variant_file_schema(headers);
    let ext = file_extension(path);
    let options = CsvReadOptions::new()
        .delimiter(b'\t')
        .comment(b'#')
        .has_header(has_header_row)
        .file_extension(&ext)
        .schema(&schema);

    let df = ctx.read_csv(path, options).await?;

    let projection = headers
        .iter()
        .map(|name| {
            if is_identifying(name) {
                ident(name)
            } else {
                cast(ident(name), DataType::Int8).alias(name)
            }
        })
        .collect::<Vec<_>>();
    df.select(projection)
}

/// Window spanned by the variant table: chromosome of the first row, the
/// smallest `start` and the largest `end`.
pub async fn variant_window(df: &DataFrame) -> Result<RegionWindow> {
    let first = df
        .clone()
        .select(vec![ident("chrom")])?
        .limit(0, Some(1))?
        .collect()
        .await?;
    let chrom = first
        .iter()
        .find(|b| b.num_rows() > 0)
        .map(|b| ScalarValue::try_from_array(b.column(0), 0))
        .transpose()?
        .and_then(|v| v.try_as_str().flatten().map(String::from))
        .ok_or_else(|| {
            DataFusionError::Execution(
                "variant table is empty; cannot determine the region window".to_string(),
            )
        })?;

    let bounds = df
        .clone()
        .aggregate(
            vec![],
            vec![
                min(ident("start")).alias("min_position"),
                max(ident("end")).alias("max_position"),
            ],
        )?
        .collect()
        .await?;
    let bound = |idx: usize| -> Result<i64> {
        let batch = bounds.first().ok_or_else(|| {
            DataFusionError::Internal("aggregate returned no batches".to_string())
        })?;
        match ScalarValue::try_from_array(batch.column(idx), 0)? {
            ScalarValue::Int64(Some(v)) => Ok(v),
            other => Err(DataFusionError::Execution(format!(
                "variant table has no usable coordinates (got {other:?})"
            ))),
        }
    };

    let window = RegionWindow {
        chrom,
        min_position: bound(0)?,
        max_position: bound(1)?,
    };
    debug!("Region window: {window:?}");
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{AsArray, Int8Array};
    use datafusion::arrow::datatypes::Int8Type;
    use std::io::Write;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".bed").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn headers_from_extra_only_line() {
        let file = write_file("#is_coding\t\tin_tss\nchr1\t1\t2\tv\tA\tC\t1\t0\n");
        let headers = read_variant_headers(file.path().to_str().unwrap()).unwrap();
        assert_eq!(
            headers,
            ["chrom", "start", "end", "variant_id", "ref", "alt", "is_coding", "in_tss"]
        );
    }

    #[test]
    fn headers_do_not_repeat_identifying_columns() {
        let file = write_file("#chrom\tstart\tend\tvariant_id\tref\talt\tis_coding\n");
        let headers = read_variant_headers(file.path().to_str().unwrap()).unwrap();
        assert_eq!(headers.len(), 7);
        assert_eq!(headers[6], "is_coding");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn extras_are_int8_and_window_is_computed() -> Result<()> {
        let file = write_file(
            "#is_coding\n\
             chr1\t150\t250\tv2\tG\tT\t0\n\
             chr1\t100\t200\tv1\tA\tC\t1\n\
             chr1\t900\t950\tv3\tC\tG\t-3\n",
        );
        let path = file.path().to_str().unwrap();
        let ctx = SessionContext::new();
        let headers = read_variant_headers(path)?;
        let df = read_variant_table(&ctx, path, &headers).await?;

        assert_eq!(
            df.schema().field_with_name(None, "is_coding")?.data_type(),
            &DataType::Int8
        );
        let batches = df.clone().collect().await?;
        let values: Vec<i8> = batches
            .iter()
            .flat_map(|b| {
                let arr: &Int8Array = b.column(6).as_primitive::<Int8Type>();
                arr.values().to_vec()
            })
            .collect();
        assert_eq!(values.len(), 3);
        assert!(values.contains(&-3));

        let window = variant_window(&df).await?;
        assert_eq!(window.chrom, "chr1");
        assert_eq!(window.min_position, 100);
        assert_eq!(window.max_position, 950);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn out_of_range_extra_fails() -> Result<()> {
        let file = write_file("#is_coding\nchr1\t100\t200\tv1\tA\tC\t300\n");
        let path = file.path().to_str().unwrap();
        let ctx = SessionContext::new();
        let headers = read_variant_headers(path)?;
        let df = read_variant_table(&ctx, path, &headers).await?;
        assert!(df.collect().await.is_err());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn non_numeric_extra_fails() -> Result<()> {
        let file = write_file(
            "#is_coding\tin_tss\n\
             chr1\t100\t200\tv1\tA\tC\t1\tabc\n",
        );
        let path = file.path().to_str().unwrap();
        let ctx = SessionContext::new();
        let headers = read_variant_headers(path)?;
        let df = read_variant_table(&ctx, path, &headers).await?;
        assert!(df.collect().await.is_err());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn column_count_mismatch_fails() -> Result<()> {
        let file = write_file("#is_coding\tin_tss\nchr1\t100\t200\tv1\tA\tC\t1\n");
        let path = file.path().to_str().unwrap();
        let ctx = SessionContext::new();
        let headers = read_variant_headers(path)?;
        let df = read_variant_table(&ctx, path, &headers).await?;
        assert!(df.collect().await.is_err());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_table_has_no_window() -> Result<()> {
        let file = write_file("#is_coding\n");
        let path = file.path().to_str().unwrap();
        let ctx = SessionContext::new();
        let headers = read_variant_headers(path)?;
        let df = read_variant_table(&ctx, path, &headers).await?;
        assert!(variant_window(&df).await.is_err());
        Ok(())
    }
}
