use anyhow::{Context, Result};
use clap::Parser;
use log::{Level, info};
use simple_logger::init_with_level;

use datafusion_bio_function_annotate::{AnnotationInputs, annotate_region, create_annotate_session};

/// Annotate the variants of one genomic region with allele frequencies,
/// regulatory evidence, pathogenicity scores and cCRE labels.
#[derive(Debug, Parser)]
#[command(name = "add_annotations", version)]
struct Args {
    #[arg(value_name = "VARIANTS", help = "Tab-separated variant file of the region")]
    variants: String,

    #[arg(value_name = "AF_PARQUET", help = "Allele-frequency table")]
    allele_frequencies: String,

    #[arg(value_name = "REGULATORY_PARQUET", help = "Regulatory database")]
    regulatory: String,

    #[arg(value_name = "PATHOGENICITY_PARQUET", help = "Pathogenicity scores")]
    pathogenicity: String,

    #[arg(value_name = "CCRE_ATLAS", help = "Headerless six-column cCRE atlas")]
    ccre_atlas: String,

    #[arg(value_name = "OUTPUT", help = "Output Parquet file")]
    output: String,
}

impl From<Args> for AnnotationInputs {
    fn from(args: Args) -> Self {
        AnnotationInputs {
            variants: args.variants,
            allele_frequencies: args.allele_frequencies,
            regulatory: args.regulatory,
            pathogenicity: args.pathogenicity,
            ccre_atlas: args.ccre_atlas,
            output: args.output,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let start = std::time::Instant::now();
    init_with_level(Level::Info)?;

    let inputs: AnnotationInputs = Args::parse().into();
    info!(
        "Now running with arguments\n 1. {}\n 2. {}\n 3. {}\n 4. {}\n 5. {}\n 6. {}",
        inputs.variants,
        inputs.allele_frequencies,
        inputs.regulatory,
        inputs.pathogenicity,
        inputs.ccre_atlas,
        inputs.output
    );

    let ctx = create_annotate_session();
    annotate_region(&ctx, &inputs)
        .await
        .with_context(|| format!("failed to annotate {}", inputs.variants))?;

    info!("Elapsed time: {:?}", start.elapsed());
    Ok(())
}
