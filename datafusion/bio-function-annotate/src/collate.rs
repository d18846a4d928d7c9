//! Concatenation of per-region annotation tables.

use datafusion::common::{DataFusionError, Result};
use datafusion::prelude::SessionContext;
use log::{debug, info};

use crate::parquet_io::{ParquetSink, check_schema_compatible, read_parquet_file};

/// Append the rows of every input Parquet file, in argument order, to a single
/// output file and return the number of rows written.
///
/// Rows keep their order within each input. Inputs must agree on column names
/// and types, and all of them are checked before the output file is created.
/// No de-duplication or reconciliation takes place. Use a session with one
/// target partition (see [`crate::create_collate_session`]) so each input is
/// read as one ordered stream.
pub async fn collate(ctx: &SessionContext, inputs: &[String], output: &str) -> Result<usize> {
    let Some(first) = inputs.first() else {
        return Err(DataFusionError::Plan(
            "collate requires at least one input file".to_string(),
        ));
    };

    let schema = read_parquet_file(ctx, first).await?.schema().as_arrow().clone();
    let mut tables = Vec::with_capacity(inputs.len());
    for path in inputs {
        tables.push((path, read_parquet_file(ctx, path).await?));
    }
    for (path, df) in &tables {
        check_schema_compatible(&schema, df.schema().as_arrow(), path)?;
    }

    let mut sink = ParquetSink::try_new(output, &schema)?;
    for (path, df) in tables {
        let rows = sink.write_stream(df.execute_stream().await?).await?;
        debug!("Appended {rows} rows from {path}");
    }

    let total = sink.finish()?;
    info!("Collated {} file(s) into {output}: {total} rows", inputs.len());
    Ok(total)
}
