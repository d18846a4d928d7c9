use std::sync::Arc;

use datafusion::arrow::datatypes::Schema;
use datafusion::catalog::TableFunctionImpl;
use datafusion::common::{DataFusionError, Result, ScalarValue};
use datafusion::datasource::TableProvider;
use datafusion::logical_expr::Expr;
use datafusion::prelude::SessionContext;

use crate::array_utils::ColTriple;
use crate::contained_join::ContainedJoinProvider;
use crate::filter_op::FilterOp;

const DEFAULT_COLS: [&str; 3] = ["chrom", "start", "end"];

const FN_NAME: &str = "contained_join";

/// Extract a string literal from an Expr, returning an error with context on failure.
fn extract_string_arg(arg: &Expr, name: &str) -> Result<String> {
    match arg {
        Expr::Literal(ScalarValue::Utf8(Some(val)), _) => Ok(val.clone()),
        other => Err(DataFusionError::Plan(format!(
            "{FN_NAME}() {name} must be a string literal, got: {other}"
        ))),
    }
}

fn default_cols() -> ColTriple {
    (
        DEFAULT_COLS[0].to_string(),
        DEFAULT_COLS[1].to_string(),
        DEFAULT_COLS[2].to_string(),
    )
}

/// Parse column and filter_op arguments following the two table names.
///
/// - No extra args: `chrom, start, end` on both sides, `FilterOp::Weak`
/// - 3 args: shared column names for both tables
/// - 6 args: left column names, then right column names
/// - an optional trailing `'strict'`/`'weak'`
fn parse_col_args(args: &[Expr]) -> Result<(ColTriple, ColTriple, FilterOp)> {
    let extra = &args[2..];

    let (col_args, filter_op) =
        if let Some(Expr::Literal(ScalarValue::Utf8(Some(val)), _)) = extra.last() {
            match val.to_lowercase().as_str() {
                "strict" => (&extra[..extra.len() - 1], FilterOp::Strict),
                "weak" => (&extra[..extra.len() - 1], FilterOp::Weak),
                _ => (extra, FilterOp::Weak),
            }
        } else {
            (extra, FilterOp::Weak)
        };

    let names = col_args
        .iter()
        .map(|arg| extract_string_arg(arg, "column name"))
        .collect::<Result<Vec<_>>>()?;

    match names.as_slice() {
        [] => Ok((default_cols(), default_cols(), filter_op)),
        [c, s, e] => {
            let cols = (c.clone(), s.clone(), e.clone());
            Ok((cols.clone(), cols, filter_op))
        }
        [lc, ls, le, rc, rs, re] => Ok((
            (lc.clone(), ls.clone(), le.clone()),
            (rc.clone(), rs.clone(), re.clone()),
            filter_op,
        )),
        other => Err(DataFusionError::Plan(format!(
            "{FN_NAME}() expects 0, 3, or 6 column name arguments (got {}). \
             Usage: {FN_NAME}('left_table', 'right_table' [, col1, col2, col3 \
             [, col4, col5, col6]] [, 'strict'|'weak'])",
            other.len()
        ))),
    }
}

/// `contained_join(left, right, ...)` table function.
struct ContainedJoinFunction {
    session: Arc<SessionContext>,
}

impl std::fmt::Debug for ContainedJoinFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContainedJoinFunction")
    }
}

impl TableFunctionImpl for ContainedJoinFunction {
    fn call(&self, args: &[Expr]) -> Result<Arc<dyn TableProvider>> {
        if args.len() < 2 {
            return Err(DataFusionError::Plan(format!(
                "{FN_NAME}() requires at least 2 arguments: left_table and right_table names"
            )));
        }

        let left_table = extract_string_arg(&args[0], "left_table")?;
        let right_table = extract_string_arg(&args[1], "right_table")?;
        let (cols_left, cols_right, filter_op) = parse_col_args(args)?;

        let (left_schema, right_schema) =
            resolve_schemas(&self.session, &left_table, &right_table)?;

        Ok(Arc::new(ContainedJoinProvider::try_new(
            Arc::clone(&self.session),
            left_table,
            right_table,
            &left_schema,
            &right_schema,
            cols_left,
            cols_right,
            filter_op,
        )?))
    }
}

/// Resolve schemas for both tables, handling tokio context.
fn resolve_schemas(
    session: &SessionContext,
    left_table: &str,
    right_table: &str,
) -> Result<(Schema, Schema)> {
    let resolve = |handle: &tokio::runtime::Handle| {
        let left = handle.block_on(session.table(left_table))?;
        let right = handle.block_on(session.table(right_table))?;
        Ok::<_, DataFusionError>((
            left.schema().as_arrow().clone(),
            right.schema().as_arrow().clone(),
        ))
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => tokio::task::block_in_place(|| resolve(&handle)),
        Err(_) => {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| DataFusionError::External(Box::new(e)))?;
            resolve(rt.handle())
        }
    }
}

/// Register the `contained_join` table function on a [`SessionContext`].
///
/// ```sql
/// -- variants nested inside atlas elements, default columns (chrom, start, end)
/// SELECT * FROM contained_join('variants', 'ccre')
///
/// -- separate column names for left and right tables, exclusive boundaries
/// SELECT * FROM contained_join('variants', 'ccre',
///     'chrom', 'start', 'end', 'contig', 'pos_start', 'pos_end', 'strict')
/// ```
pub fn register_ranges_functions(ctx: &SessionContext) {
    let session = Arc::new(ctx.clone());
    ctx.register_udtf(FN_NAME, Arc::new(ContainedJoinFunction { session }));
}
