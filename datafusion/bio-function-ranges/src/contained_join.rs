//! Left interval-nesting join.
//!
//! Every row of the left table is matched against the rows of the right table
//! whose `[start, end]` interval on the same contig fully contains it. The
//! right side is collected and indexed with [`ContainmentIndex`]; left
//! partitions are streamed through the index batch by batch.

use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use datafusion::arrow::array::{ArrayRef, RecordBatch, UInt32Array, UInt32Builder};
use datafusion::arrow::compute::{concat_batches, take};
use datafusion::arrow::datatypes::{Field, Schema, SchemaRef};
use datafusion::catalog::Session;
use datafusion::common::{DataFusionError, Result};
use datafusion::datasource::{TableProvider, TableType};
use datafusion::execution::{SendableRecordBatchStream, TaskContext};
use datafusion::physical_expr::{EquivalenceProperties, Partitioning};
use datafusion::physical_plan::execution_plan::{Boundedness, EmissionType};
use datafusion::physical_plan::stream::RecordBatchStreamAdapter;
use datafusion::physical_plan::{
    DisplayAs, DisplayFormatType, ExecutionPlan, ExecutionPlanProperties, PlanProperties,
};
use datafusion::prelude::{Expr, SessionContext};
use futures::StreamExt;
use log::debug;

use crate::array_utils::{ColTriple, get_coordinate_arrays};
use crate::filter_op::FilterOp;
use crate::interval_tree::ContainmentIndex;

/// Table provider for `left LEFT JOIN right ON left ⊆ right`.
///
/// Output schema: every left column, followed by every right column except
/// the right coordinate columns. Right columns are always nullable since
/// unmatched left rows carry nulls there.
pub struct ContainedJoinProvider {
    session: Arc<SessionContext>,
    left_table: String,
    right_table: String,
    left_columns: ColTriple,
    right_columns: ColTriple,
    /// Indices of the right columns carried into the output.
    right_payload: Vec<usize>,
    filter_op: FilterOp,
    schema: SchemaRef,
}

impl ContainedJoinProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        session: Arc<SessionContext>,
        left_table: String,
        right_table: String,
        left_schema: &Schema,
        right_schema: &Schema,
        left_columns: ColTriple,
        right_columns: ColTriple,
        filter_op: FilterOp,
    ) -> Result<Self> {
        for (schema, (c, s, e), side) in [
            (left_schema, &left_columns, "left"),
            (right_schema, &right_columns, "right"),
        ] {
            for name in [c, s, e] {
                if schema.field_with_name(name).is_err() {
                    return Err(DataFusionError::Plan(format!(
                        "{side} table is missing coordinate column '{name}'"
                    )));
                }
            }
        }

        let mut fields: Vec<Arc<Field>> = left_schema.fields().iter().cloned().collect();
        let mut right_payload = Vec::new();
        for (idx, field) in right_schema.fields().iter().enumerate() {
            let name = field.name();
            if *name == right_columns.0 || *name == right_columns.1 || *name == right_columns.2 {
                continue;
            }
            if left_schema.field_with_name(name).is_ok() {
                return Err(DataFusionError::Plan(format!(
                    "column '{name}' exists in both '{left_table}' and '{right_table}'"
                )));
            }
            fields.push(Arc::new(Field::new(
                name,
                field.data_type().clone(),
                true,
            )));
            right_payload.push(idx);
        }

        Ok(Self {
            session,
            left_table,
            right_table,
            left_columns,
            right_columns,
            right_payload,
            filter_op,
            schema: Arc::new(Schema::new(fields)),
        })
    }
}

impl Debug for ContainedJoinProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ContainedJoinProvider {{ left: {}, right: {}, filter_op: {:?} }}",
            self.left_table, self.right_table, self.filter_op
        )
    }
}

#[async_trait]
impl TableProvider for ContainedJoinProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn table_type(&self) -> TableType {
        TableType::Temporary
    }

    async fn scan(
        &self,
        _state: &dyn Session,
        projection: Option<&Vec<usize>>,
        _filters: &[Expr],
        _limit: Option<usize>,
    ) -> Result<Arc<dyn ExecutionPlan>> {
        let right_df = self.session.table(self.right_table.clone()).await?;
        let right_schema = Arc::new(right_df.schema().as_arrow().clone());
        let right_batches = right_df.collect().await?;
        let right = concat_batches(&right_schema, &right_batches)?;

        let index = ContainmentIndex::from_batch(&right, &self.right_columns)?;
        debug!(
            "Indexed {} intervals from '{}' for contained join",
            index.len(),
            self.right_table
        );
        let payload = self
            .right_payload
            .iter()
            .map(|&idx| Arc::clone(right.column(idx)))
            .collect::<Vec<_>>();

        let left_plan = self
            .session
            .table(self.left_table.clone())
            .await?
            .create_physical_plan()
            .await?;

        let schema = match projection {
            Some(indices) => Arc::new(self.schema.project(indices)?),
            None => self.schema.clone(),
        };
        let partitions = left_plan.output_partitioning().partition_count();

        Ok(Arc::new(ContainedJoinExec {
            schema: schema.clone(),
            full_schema: self.schema.clone(),
            projection: projection.cloned(),
            index: Arc::new(index),
            payload: Arc::new(payload),
            left: left_plan,
            left_columns: Arc::new(self.left_columns.clone()),
            filter_op: self.filter_op,
            cache: PlanProperties::new(
                EquivalenceProperties::new(schema),
                Partitioning::UnknownPartitioning(partitions),
                EmissionType::Incremental,
                Boundedness::Bounded,
            ),
        }))
    }
}

struct ContainedJoinExec {
    schema: SchemaRef,
    full_schema: SchemaRef,
    projection: Option<Vec<usize>>,
    index: Arc<ContainmentIndex>,
    payload: Arc<Vec<ArrayRef>>,
    left: Arc<dyn ExecutionPlan>,
    left_columns: Arc<ColTriple>,
    filter_op: FilterOp,
    cache: PlanProperties,
}

impl Debug for ContainedJoinExec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContainedJoinExec")
    }
}

impl DisplayAs for ContainedJoinExec {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "ContainedJoinExec: join_type=Left, on=[({}, {}, {})], intervals={}, filter_op={:?}",
            self.left_columns.0,
            self.left_columns.1,
            self.left_columns.2,
            self.index.len(),
            self.filter_op
        )
    }
}

impl ExecutionPlan for ContainedJoinExec {
    fn name(&self) -> &str {
        "ContainedJoinExec"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn properties(&self) -> &PlanProperties {
        &self.cache
    }

    fn children(&self) -> Vec<&Arc<dyn ExecutionPlan>> {
        vec![&self.left]
    }

    fn with_new_children(
        self: Arc<Self>,
        children: Vec<Arc<dyn ExecutionPlan>>,
    ) -> Result<Arc<dyn ExecutionPlan>> {
        if children.len() != 1 {
            return Err(DataFusionError::Internal(
                "ContainedJoinExec expects exactly one child plan".to_string(),
            ));
        }

        Ok(Arc::new(ContainedJoinExec {
            schema: self.schema.clone(),
            full_schema: self.full_schema.clone(),
            projection: self.projection.clone(),
            index: Arc::clone(&self.index),
            payload: Arc::clone(&self.payload),
            left: Arc::clone(&children[0]),
            left_columns: Arc::clone(&self.left_columns),
            filter_op: self.filter_op,
            cache: PlanProperties::new(
                EquivalenceProperties::new(self.schema.clone()),
                Partitioning::UnknownPartitioning(
                    children[0].output_partitioning().partition_count(),
                ),
                EmissionType::Incremental,
                Boundedness::Bounded,
            ),
        }))
    }

    fn execute(
        &self,
        partition: usize,
        context: Arc<TaskContext>,
    ) -> Result<SendableRecordBatchStream> {
        let left_stream = self.left.execute(partition, context)?;
        let index = Arc::clone(&self.index);
        let payload = Arc::clone(&self.payload);
        let left_columns = Arc::clone(&self.left_columns);
        let full_schema = self.full_schema.clone();
        let projection = self.projection.clone();
        let filter_op = self.filter_op;

        let stream = left_stream.map(move |rb| {
            let joined = probe_batch(
                &rb?,
                &index,
                &payload,
                &left_columns,
                filter_op,
                &full_schema,
            )?;
            match &projection {
                Some(indices) => Ok(joined.project(indices)?),
                None => Ok(joined),
            }
        });

        Ok(Box::pin(RecordBatchStreamAdapter::new(
            self.schema.clone(),
            stream,
        )))
    }
}

/// Join one left batch against the index.
///
/// Each left row is emitted once per containing right row, or once with null
/// right columns when nothing contains it.
fn probe_batch(
    batch: &RecordBatch,
    index: &ContainmentIndex,
    payload: &[ArrayRef],
    left_columns: &ColTriple,
    filter_op: FilterOp,
    schema: &SchemaRef,
) -> Result<RecordBatch> {
    let arrays = get_coordinate_arrays(batch, left_columns)?;
    let mut left_idx = UInt32Builder::with_capacity(batch.num_rows());
    let mut right_idx = UInt32Builder::with_capacity(batch.num_rows());

    for i in 0..batch.num_rows() {
        let row = u32::try_from(i).map_err(|_| {
            DataFusionError::Execution(format!("batch row {i} does not fit in u32"))
        })?;
        let mut matched = false;
        if let Some((contig, start, end)) = arrays.row(i)? {
            index.for_each_container(contig, start, end, filter_op, |position| {
                left_idx.append_value(row);
                right_idx.append_value(position as u32);
                matched = true;
            });
        }
        if !matched {
            left_idx.append_value(row);
            right_idx.append_null();
        }
    }

    let left_idx: UInt32Array = left_idx.finish();
    let right_idx: UInt32Array = right_idx.finish();

    let mut columns = batch
        .columns()
        .iter()
        .map(|c| take(c.as_ref(), &left_idx, None))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for arr in payload {
        columns.push(take(arr.as_ref(), &right_idx, None)?);
    }

    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}
