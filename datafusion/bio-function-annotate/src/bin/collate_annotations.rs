use anyhow::{Context, Result};
use clap::Parser;
use log::{Level, info};
use simple_logger::init_with_level;

use datafusion_bio_function_annotate::{collate, create_collate_session};

/// Concatenate annotated region tables into one Parquet file.
#[derive(Debug, Parser)]
#[command(name = "collate_annotations", version)]
struct Args {
    #[arg(
        required = true,
        num_args = 2..,
        value_name = "PATHS",
        help = "Input Parquet files followed by the output path"
    )]
    paths: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_with_level(Level::Info)?;

    let mut inputs = Args::parse().paths;
    let output = inputs.pop().context("missing output path")?;

    let shown = inputs.iter().take(5).cloned().collect::<Vec<_>>();
    info!("Input files: {shown:?}...");
    info!("Now writing to {output}");

    let ctx = create_collate_session();
    let rows = collate(&ctx, &inputs, &output)
        .await
        .with_context(|| format!("failed to collate into {output}"))?;

    info!("Wrote {rows} rows");
    Ok(())
}
