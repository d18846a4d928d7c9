//! Region annotation run: load, merge, finalize, write.

use datafusion::arrow::util::pretty::pretty_format_batches;
use datafusion::common::Result;
use datafusion::dataframe::DataFrame;
use datafusion::prelude::SessionContext;
use log::info;

use crate::ccre::read_ccre_atlas;
use crate::config::AnnotateConfig;
use crate::finalize::finalize;
use crate::merge::{merge_allele_frequencies, merge_ccre, merge_pathogenicity, merge_regulatory};
use crate::parquet_io::write_parquet_file;
use crate::schema_contract::VARIANT_COLUMNS;
use crate::sources::{AlleleFrequencySource, PathogenicitySource, RegulatorySource};
use crate::variants::{read_variant_headers, read_variant_table, variant_window};

/// Paths of one annotation run.
#[derive(Debug, Clone)]
pub struct AnnotationInputs {
    /// Tab-separated variant file of the region.
    pub variants: String,
    /// Allele-frequency Parquet table.
    pub allele_frequencies: String,
    /// Regulatory database Parquet table.
    pub regulatory: String,
    /// Pathogenicity Parquet table.
    pub pathogenicity: String,
    /// Headerless cCRE atlas.
    pub ccre_atlas: String,
    /// Destination Parquet file.
    pub output: String,
}

async fn preview(df: &DataFrame, label: &str, rows: usize) -> Result<()> {
    let batches = df.clone().limit(0, Some(rows))?.collect().await?;
    info!("{label}:\n{}", pretty_format_batches(&batches)?);
    Ok(())
}

/// Annotate the variants of one region and write the enriched table to
/// `inputs.output`. Returns the number of rows written.
///
/// Imputation defaults and diagnostics come from the session's
/// [`AnnotateConfig`].
pub async fn annotate_region(ctx: &SessionContext, inputs: &AnnotationInputs) -> Result<usize> {
    let config = AnnotateConfig::from_session(ctx);

    let headers = read_variant_headers(&inputs.variants)?;
    let variants = read_variant_table(ctx, &inputs.variants, &headers).await?;
    let window = variant_window(&variants).await?;
    info!("Loaded variant file {}", inputs.variants);

    let allele_frequencies = AlleleFrequencySource::open(ctx, &inputs.allele_frequencies).await?;
    let regulatory = RegulatorySource::open(ctx, &inputs.regulatory).await?;
    let pathogenicity = PathogenicitySource::open(ctx, &inputs.pathogenicity).await?;
    let atlas = read_ccre_atlas(ctx, &inputs.ccre_atlas, &window)
        .await?
        .cache()
        .await?;
    info!("Loaded cCRE atlas {}", inputs.ccre_atlas);

    info!("Now merging");
    let merged = merge_allele_frequencies(variants, &allele_frequencies, &config).await?;
    let merged = merge_regulatory(merged, &regulatory, &config).await?;
    let merged = merge_pathogenicity(merged, &pathogenicity, &config)
        .await?
        .cache()
        .await?;

    preview(&merged, "Merged point annotations", config.preview_rows).await?;
    preview(&atlas, "cCRE atlas", config.preview_rows).await?;

    let joined = merge_ccre(ctx, merged, atlas).await?;
    preview(&joined, "With cCRE labels", config.preview_rows).await?;

    let extra_columns: Vec<String> = headers
        .into_iter()
        .filter(|h| !VARIANT_COLUMNS.contains(&h.as_str()))
        .collect();
    let finalized = finalize(joined, &extra_columns, &allele_frequencies.af_columns)?;

    info!("Now writing {}", inputs.output);
    let rows = write_parquet_file(finalized, &inputs.output).await?;
    info!("Wrote {rows} annotated rows");
    Ok(rows)
}
