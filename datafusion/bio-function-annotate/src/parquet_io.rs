//! Single-file Parquet input and output.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use datafusion::arrow::array::RecordBatch;
use datafusion::arrow::datatypes::{Field, Schema, SchemaRef};
use datafusion::common::{DataFusionError, Result};
use datafusion::dataframe::DataFrame;
use datafusion::execution::SendableRecordBatchStream;
use datafusion::parquet::arrow::ArrowWriter;
use datafusion::parquet::basic::Compression;
use datafusion::parquet::file::properties::WriterProperties;
use datafusion::prelude::{ParquetReadOptions, SessionContext};
use futures::StreamExt;
use log::debug;

/// File extension as DataFusion's listing options expect it (`.parquet`, or
/// empty for extensionless paths).
pub(crate) fn file_extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Read one Parquet file regardless of its extension.
pub async fn read_parquet_file(ctx: &SessionContext, path: &str) -> Result<DataFrame> {
    let ext = file_extension(path);
    let options = ParquetReadOptions {
        file_extension: &ext,
        ..Default::default()
    };
    ctx.read_parquet(path, options).await
}

/// Fail unless `actual` has the column names and types of `expected`, in
/// order. Nullability is ignored.
pub fn check_schema_compatible(expected: &Schema, actual: &Schema, source: &str) -> Result<()> {
    let compatible = expected.fields().len() == actual.fields().len()
        && expected
            .fields()
            .iter()
            .zip(actual.fields().iter())
            .all(|(e, a)| e.name() == a.name() && e.data_type() == a.data_type());
    if compatible {
        return Ok(());
    }
    let describe = |s: &Schema| {
        s.fields()
            .iter()
            .map(|f| format!("{}: {}", f.name(), f.data_type()))
            .collect::<Vec<_>>()
            .join(", ")
    };
    Err(DataFusionError::Execution(format!(
        "schema of {source} [{}] does not match output schema [{}]",
        describe(actual),
        describe(expected)
    )))
}

/// Streaming writer producing one Snappy-compressed Parquet file.
///
/// Every batch is written in arrival order. All sink columns are nullable so
/// inputs that differ only in nullability can share a file.
pub struct ParquetSink {
    path: String,
    schema: SchemaRef,
    writer: ArrowWriter<File>,
    rows: usize,
}

impl ParquetSink {
    pub fn try_new(path: &str, schema: &Schema) -> Result<Self> {
        let schema = Arc::new(Schema::new(
            schema
                .fields()
                .iter()
                .map(|f| Field::new(f.name(), f.data_type().clone(), true))
                .collect::<Vec<_>>(),
        ));
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let file = File::create(path)?;
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        Ok(Self {
            path: path.to_string(),
            schema,
            writer,
            rows: 0,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        if batch.num_rows() == 0 {
            return Ok(());
        }
        let batch = RecordBatch::try_new(self.schema.clone(), batch.columns().to_vec())?;
        self.writer.write(&batch)?;
        self.rows += batch.num_rows();
        Ok(())
    }

    /// Drain `stream` into the sink, returning the rows it contributed.
    pub async fn write_stream(&mut self, mut stream: SendableRecordBatchStream) -> Result<usize> {
        let before = self.rows;
        while let Some(batch) = stream.next().await {
            self.write(&batch?)?;
        }
        Ok(self.rows - before)
    }

    /// Flush the footer and return the total number of rows written.
    pub fn finish(self) -> Result<usize> {
        self.writer.close()?;
        debug!("Wrote {} rows to {}", self.rows, self.path);
        Ok(self.rows)
    }
}

/// Execute `df` and write its rows to `path` in plan output order.
pub async fn write_parquet_file(df: DataFrame, path: &str) -> Result<usize> {
    let stream = df.execute_stream().await?;
    let mut sink = ParquetSink::try_new(path, stream.schema().as_ref())?;
    sink.write_stream(stream).await?;
    sink.finish()
}
