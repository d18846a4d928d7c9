use datafusion::arrow::array::{
    Array, GenericStringArray, Int32Array, Int64Array, RecordBatch, StringViewArray, UInt32Array,
    UInt64Array,
};
use datafusion::arrow::datatypes::DataType;
use datafusion::common::{DataFusionError, Result};

/// Names of the `(contig, start, end)` columns of one side of a join.
pub type ColTriple = (String, String, String);

/// Borrowed view over a contig column in any of the string layouts DataFusion
/// produces (CSV gives `Utf8`, parquet gives `Utf8View`).
pub enum ContigArray<'a> {
    LargeUtf8(&'a GenericStringArray<i64>),
    Utf8View(&'a StringViewArray),
    Utf8(&'a GenericStringArray<i32>),
}

impl ContigArray<'_> {
    pub fn value(&self, i: usize) -> &str {
        match self {
            ContigArray::LargeUtf8(arr) => arr.value(i),
            ContigArray::Utf8View(arr) => arr.value(i),
            ContigArray::Utf8(arr) => arr.value(i),
        }
    }

    pub fn is_null(&self, i: usize) -> bool {
        match self {
            ContigArray::LargeUtf8(arr) => arr.is_null(i),
            ContigArray::Utf8View(arr) => arr.is_null(i),
            ContigArray::Utf8(arr) => arr.is_null(i),
        }
    }
}

/// Borrowed view over an integer coordinate column.
pub enum PosArray<'a> {
    Int32(&'a Int32Array),
    Int64(&'a Int64Array),
    UInt32(&'a UInt32Array),
    UInt64(&'a UInt64Array),
}

fn overflow(v: impl std::fmt::Display, i: usize) -> DataFusionError {
    DataFusionError::Execution(format!(
        "coordinate value {v} at row {i} overflows i32 (max {})",
        i32::MAX
    ))
}

impl PosArray<'_> {
    /// Coordinate at row `i` narrowed to the `i32` domain of the interval trees.
    pub fn value(&self, i: usize) -> Result<i32> {
        match self {
            PosArray::Int32(arr) => Ok(arr.value(i)),
            PosArray::Int64(arr) => {
                let v = arr.value(i);
                i32::try_from(v).map_err(|_| overflow(v, i))
            }
            PosArray::UInt32(arr) => {
                let v = arr.value(i);
                i32::try_from(v).map_err(|_| overflow(v, i))
            }
            PosArray::UInt64(arr) => {
                let v = arr.value(i);
                i32::try_from(v).map_err(|_| overflow(v, i))
            }
        }
    }

    pub fn is_null(&self, i: usize) -> bool {
        match self {
            PosArray::Int32(arr) => arr.is_null(i),
            PosArray::Int64(arr) => arr.is_null(i),
            PosArray::UInt32(arr) => arr.is_null(i),
            PosArray::UInt64(arr) => arr.is_null(i),
        }
    }
}

/// Coordinate columns of a single batch, resolved once per batch.
pub struct CoordinateArrays<'a> {
    pub contig: ContigArray<'a>,
    pub start: PosArray<'a>,
    pub end: PosArray<'a>,
}

impl CoordinateArrays<'_> {
    /// Returns `(contig, start, end)` for row `i`, or `None` when any of the
    /// three values is null. Null coordinates never match an interval.
    pub fn row(&self, i: usize) -> Result<Option<(&str, i32, i32)>> {
        if self.contig.is_null(i) || self.start.is_null(i) || self.end.is_null(i) {
            return Ok(None);
        }
        Ok(Some((
            self.contig.value(i),
            self.start.value(i)?,
            self.end.value(i)?,
        )))
    }
}

fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}

/// Extract contig, start, and end column arrays from a [`RecordBatch`].
///
/// Returns an error if a column is missing or has an unsupported data type.
pub fn get_coordinate_arrays<'a>(
    batch: &'a RecordBatch,
    columns: &ColTriple,
) -> Result<CoordinateArrays<'a>> {
    let contig_col = batch.column_by_name(&columns.0).ok_or_else(|| {
        DataFusionError::Plan(format!(
            "contig column '{}' not found in batch with columns: {:?}",
            columns.0,
            column_names(batch)
        ))
    })?;

    let downcast_err = |layout: &str| {
        DataFusionError::Internal(format!(
            "failed to downcast contig column '{}' to {layout}",
            columns.0
        ))
    };
    let any = contig_col.as_any();
    let contig = match contig_col.data_type() {
        DataType::LargeUtf8 => ContigArray::LargeUtf8(
            any.downcast_ref::<GenericStringArray<i64>>()
                .ok_or_else(|| downcast_err("LargeUtf8"))?,
        ),
        DataType::Utf8View => ContigArray::Utf8View(
            any.downcast_ref::<StringViewArray>()
                .ok_or_else(|| downcast_err("Utf8View"))?,
        ),
        DataType::Utf8 => ContigArray::Utf8(
            any.downcast_ref::<GenericStringArray<i32>>()
                .ok_or_else(|| downcast_err("Utf8"))?,
        ),
        dt => {
            return Err(DataFusionError::NotImplemented(format!(
                "unsupported data type {dt:?} for contig column '{}'; expected Utf8, LargeUtf8, or Utf8View",
                columns.0
            )));
        }
    };

    Ok(CoordinateArrays {
        contig,
        start: extract_pos_array(batch, &columns.1, "start")?,
        end: extract_pos_array(batch, &columns.2, "end")?,
    })
}

fn extract_pos_array<'a>(
    batch: &'a RecordBatch,
    col_name: &str,
    label: &str,
) -> Result<PosArray<'a>> {
    let col = batch.column_by_name(col_name).ok_or_else(|| {
        DataFusionError::Plan(format!(
            "{label} column '{col_name}' not found in batch with columns: {:?}",
            column_names(batch)
        ))
    })?;

    let downcast_err = |layout: &str| {
        DataFusionError::Internal(format!(
            "failed to downcast {label} column '{col_name}' to {layout}"
        ))
    };
    let any = col.as_any();
    match col.data_type() {
        DataType::Int32 => Ok(PosArray::Int32(
            any.downcast_ref::<Int32Array>()
                .ok_or_else(|| downcast_err("Int32"))?,
        )),
        DataType::Int64 => Ok(PosArray::Int64(
            any.downcast_ref::<Int64Array>()
                .ok_or_else(|| downcast_err("Int64"))?,
        )),
        DataType::UInt32 => Ok(PosArray::UInt32(
            any.downcast_ref::<UInt32Array>()
                .ok_or_else(|| downcast_err("UInt32"))?,
        )),
        DataType::UInt64 => Ok(PosArray::UInt64(
            any.downcast_ref::<UInt64Array>()
                .ok_or_else(|| downcast_err("UInt64"))?,
        )),
        dt => Err(DataFusionError::NotImplemented(format!(
            "unsupported data type {dt:?} for {label} column '{col_name}'; expected Int32, Int64, UInt32, or UInt64"
        ))),
    }
}
