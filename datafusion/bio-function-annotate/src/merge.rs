//! Left joins of the variant table against each annotation source.
//!
//! The point merges join on `variant_id` and impute the source's payload
//! columns for unmatched variants. Duplicate keys on the right fan out rows;
//! nothing is dropped. The cCRE merge is an interval-nesting join executed by
//! [`ContainedJoinProvider`].

use std::sync::Arc;

use ahash::AHashSet;
use datafusion::arrow::datatypes::DataType;
use datafusion::common::{JoinType, Result, ScalarValue};
use datafusion::dataframe::DataFrame;
use datafusion::functions::core::expr_fn::coalesce;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::prelude::{Expr, SessionContext, cast, ident, lit};
use datafusion_bio_function_ranges::{ContainedJoinProvider, FilterOp};
use log::{debug, info, warn};

use crate::config::AnnotateConfig;
use crate::schema_contract::{JOIN_KEY, PATHOGENICITY_COLUMN, REGULATORY_COLUMNS, is_af_column};
use crate::sources::{AlleleFrequencySource, PathogenicitySource, RegulatorySource};

/// Temporary name of the right-hand join key.
const RIGHT_KEY: &str = "__right_variant_id";

/// Name under which the merged variant table is registered for the cCRE join.
pub const VARIANTS_VIEW: &str = "annotated_variants";

/// Name under which the pivoted atlas is registered for the cCRE join.
pub const CCRE_VIEW: &str = "ccre_atlas";

const COORDINATES: [(&str, &str); 3] = [("chrom", "chrom"), ("start", "start"), ("end", "end")];

/// First `<name>_right`, `<name>_right_right`, ... not in `taken`.
fn suffixed_name(name: &str, taken: &AHashSet<String>) -> String {
    let mut candidate = format!("{name}_right");
    while taken.contains(&candidate) {
        candidate.push_str("_right");
    }
    candidate
}

/// Rename the right columns that would collide with `left`.
///
/// Returns the projection to apply to `right` and, for each payload column,
/// its source name and its name after the projection. Key columns listed in
/// `keys` as `(name, output)` are aliased as given and are not reported.
fn disambiguate(
    left: &DataFrame,
    right: &DataFrame,
    keys: &[(&str, &str)],
) -> (Vec<Expr>, Vec<(String, String)>) {
    let mut taken: AHashSet<String> = left
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    let mut projection = Vec::new();
    let mut payload = Vec::new();
    for field in right.schema().fields() {
        let name = field.name();
        if let Some((_, output)) = keys.iter().find(|(key, _)| *key == name.as_str()) {
            projection.push(ident(name).alias(*output));
            continue;
        }
        let output = if taken.contains(name) {
            let renamed = suffixed_name(name, &taken);
            debug!("Renaming right column '{name}' to '{renamed}'");
            renamed
        } else {
            name.clone()
        };
        taken.insert(output.clone());
        projection.push(ident(name).alias(&output));
        payload.push((name.clone(), output));
    }
    (projection, payload)
}

/// Log how many keys of `right` occur more than once.
async fn warn_duplicate_keys(right: &DataFrame, source: &str) -> Result<()> {
    let duplicates = right
        .clone()
        .aggregate(vec![ident(JOIN_KEY)], vec![count(lit(1)).alias("occurrences")])?
        .filter(ident("occurrences").gt(lit(1_i64)))?
        .count()
        .await?;
    if duplicates > 0 {
        warn!(
            "{source} has {duplicates} duplicated '{JOIN_KEY}' value(s); matching variants will fan out"
        );
    } else {
        debug!("{source} has unique '{JOIN_KEY}' values");
    }
    Ok(())
}

/// Left join `right` onto `left` by `variant_id`, imputing nulls in payload
/// columns for which `fill` returns a value.
///
/// The fill literal is cast to the column's type after the join.
async fn point_merge<F>(
    left: DataFrame,
    right: DataFrame,
    source: &str,
    config: &AnnotateConfig,
    fill: F,
) -> Result<DataFrame>
where
    F: Fn(&str) -> Option<ScalarValue>,
{
    if config.validate_join_keys {
        warn_duplicate_keys(&right, source).await?;
    }

    let (projection, payload) = disambiguate(&left, &right, &[(JOIN_KEY, RIGHT_KEY)]);
    let right = right.select(projection)?;

    let left_columns: Vec<String> = left
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let joined = left.join(right, JoinType::Left, &[JOIN_KEY], &[RIGHT_KEY], None)?;

    let mut output: Vec<Expr> = left_columns.iter().map(ident).collect();
    let mut filled = 0;
    for (source_name, name) in &payload {
        let expr = match fill(source_name) {
            Some(value) => {
                let dtype = joined
                    .schema()
                    .field_with_unqualified_name(name)?
                    .data_type()
                    .clone();
                filled += 1;
                impute(name, value, dtype)
            }
            None => ident(name),
        };
        output.push(expr);
    }

    info!(
        "Merged {source}: {} column(s) added, {filled} imputed",
        payload.len()
    );
    joined.select(output)
}

fn impute(name: &str, value: ScalarValue, dtype: DataType) -> Expr {
    coalesce(vec![ident(name), cast(lit(value), dtype)]).alias(name)
}

/// Join population allele frequencies; every column containing `AF_` is
/// filled with `annotate.af_fill`.
pub async fn merge_allele_frequencies(
    left: DataFrame,
    source: &AlleleFrequencySource,
    config: &AnnotateConfig,
) -> Result<DataFrame> {
    let af_fill = config.af_fill;
    point_merge(
        left,
        source.df.clone(),
        "allele-frequency table",
        config,
        |name| is_af_column(name).then(|| ScalarValue::Float64(Some(af_fill))),
    )
    .await
}

/// Join regulatory evidence; the four flags default to `false`.
pub async fn merge_regulatory(
    left: DataFrame,
    source: &RegulatorySource,
    config: &AnnotateConfig,
) -> Result<DataFrame> {
    point_merge(
        left,
        source.df.clone(),
        "regulatory database",
        config,
        |name| REGULATORY_COLUMNS.contains(&name).then_some(ScalarValue::Boolean(Some(false))),
    )
    .await
}

/// Join pathogenicity scores; missing scores become `annotate.pathogenicity_fill`.
pub async fn merge_pathogenicity(
    left: DataFrame,
    source: &PathogenicitySource,
    config: &AnnotateConfig,
) -> Result<DataFrame> {
    let pathogenicity_fill = config.pathogenicity_fill;
    point_merge(
        left,
        source.df.clone(),
        "pathogenicity table",
        config,
        |name| {
            (name == PATHOGENICITY_COLUMN)
                .then(|| ScalarValue::Float64(Some(pathogenicity_fill)))
        },
    )
    .await
}

fn replace_view(ctx: &SessionContext, name: &str, df: DataFrame) -> Result<()> {
    ctx.deregister_table(name)?;
    ctx.register_table(name, df.into_view())?;
    Ok(())
}

/// Attach the atlas label flags of every element that contains each variant.
///
/// Matching is `variant.chrom == atlas.chrom`, `atlas.start <= variant.start`
/// and `variant.end <= atlas.end`. The atlas coordinates are not carried into
/// the output. Unmatched variants keep one row with null labels.
pub async fn merge_ccre(
    ctx: &SessionContext,
    left: DataFrame,
    atlas: DataFrame,
) -> Result<DataFrame> {
    let (projection, _) = disambiguate(&left, &atlas, &COORDINATES);
    let atlas = atlas.select(projection)?;

    replace_view(ctx, VARIANTS_VIEW, left)?;
    replace_view(ctx, CCRE_VIEW, atlas)?;

    let left_schema = ctx.table(VARIANTS_VIEW).await?.schema().as_arrow().clone();
    let right_schema = ctx.table(CCRE_VIEW).await?.schema().as_arrow().clone();
    let columns = (
        "chrom".to_string(),
        "start".to_string(),
        "end".to_string(),
    );
    let provider = ContainedJoinProvider::try_new(
        Arc::new(ctx.clone()),
        VARIANTS_VIEW.to_string(),
        CCRE_VIEW.to_string(),
        &left_schema,
        &right_schema,
        columns.clone(),
        columns,
        FilterOp::Weak,
    )?;

    info!("Joining variants with cCRE atlas by interval containment");
    ctx.read_table(Arc::new(provider))
}
