//! Point-join annotation sources.
//!
//! Each source reads one Parquet file, checks the columns it needs, and
//! projects them into the shape its merge expects: a `variant_id` key of type
//! `Utf8` plus typed payload columns.

use datafusion::arrow::datatypes::DataType;
use datafusion::common::Result;
use datafusion::dataframe::DataFrame;
use datafusion::prelude::{Expr, SessionContext, cast, ident};
use log::info;

use crate::parquet_io::read_parquet_file;
use crate::schema_contract::{
    JOIN_KEY, PATHOGENICITY_COLUMN, REGULATORY_COLUMNS, REGULATORY_KEY, discover_af_columns,
    is_af_column, validate_required_columns,
};

fn key_as(name: &str) -> Expr {
    cast(ident(name), DataType::Utf8).alias(JOIN_KEY)
}

/// Population allele frequencies keyed by `variant_id`.
#[derive(Debug, Clone)]
pub struct AlleleFrequencySource {
    pub df: DataFrame,
    /// Columns starting with `AF_`, in source-schema order.
    pub af_columns: Vec<String>,
}

impl AlleleFrequencySource {
    /// Every column containing `AF_` is cast to `Float32`; other columns pass
    /// through unchanged.
    pub async fn open(ctx: &SessionContext, path: &str) -> Result<Self> {
        let df = read_parquet_file(ctx, path).await?;
        validate_required_columns(df.schema().as_arrow(), &[JOIN_KEY], "allele-frequency table")?;

        let projection = df
            .schema()
            .fields()
            .iter()
            .map(|f| {
                let name = f.name();
                if name == JOIN_KEY {
                    key_as(JOIN_KEY)
                } else if is_af_column(name) {
                    cast(ident(name), DataType::Float32).alias(name)
                } else {
                    ident(name)
                }
            })
            .collect::<Vec<_>>();
        let df = df.select(projection)?;
        let af_columns = discover_af_columns(df.schema().as_arrow());

        info!(
            "Loaded allele-frequency table {path} with {} AF column(s)",
            af_columns.len()
        );
        Ok(Self { df, af_columns })
    }
}

/// Regulatory evidence flags keyed by `variant_id` (stored as `ID`).
#[derive(Debug, Clone)]
pub struct RegulatorySource {
    pub df: DataFrame,
}

impl RegulatorySource {
    pub async fn open(ctx: &SessionContext, path: &str) -> Result<Self> {
        let df = read_parquet_file(ctx, path).await?;
        let required: Vec<&str> = std::iter::once(REGULATORY_KEY)
            .chain(REGULATORY_COLUMNS.iter().copied())
            .collect();
        validate_required_columns(df.schema().as_arrow(), &required, "regulatory database")?;

        let projection = std::iter::once(key_as(REGULATORY_KEY))
            .chain(
                REGULATORY_COLUMNS
                    .iter()
                    .map(|&name| cast(ident(name), DataType::Boolean).alias(name)),
            )
            .collect::<Vec<_>>();

        info!("Loaded regulatory database {path}");
        Ok(Self {
            df: df.select(projection)?,
        })
    }
}

/// Missense pathogenicity scores keyed by `variant_id`.
#[derive(Debug, Clone)]
pub struct PathogenicitySource {
    pub df: DataFrame,
}

impl PathogenicitySource {
    pub async fn open(ctx: &SessionContext, path: &str) -> Result<Self> {
        let df = read_parquet_file(ctx, path).await?;
        validate_required_columns(
            df.schema().as_arrow(),
            &[JOIN_KEY, PATHOGENICITY_COLUMN],
            "pathogenicity table",
        )?;

        info!("Loaded pathogenicity table {path}");
        Ok(Self {
            df: df.select(vec![key_as(JOIN_KEY), ident(PATHOGENICITY_COLUMN)])?,
        })
    }
}
