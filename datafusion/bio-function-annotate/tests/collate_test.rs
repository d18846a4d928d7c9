use std::path::Path;

use datafusion::arrow::array::AsArray;
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{DataType, Int64Type};
use datafusion::common::assert_contains;
use datafusion::error::Result;
use datafusion::prelude::SessionContext;
use tempfile::TempDir;

use datafusion_bio_function_annotate::{
    collate, create_collate_session, read_parquet_file, write_parquet_file,
};

#[rstest::fixture]
fn ctx() -> SessionContext {
    create_collate_session()
}

#[rstest::fixture]
fn workdir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Write `rows` rows tagged with `region`, with `pos` counting down from
/// `first + rows - 1` so file order differs from sorted order.
async fn write_region(
    ctx: &SessionContext,
    dir: &Path,
    region: &str,
    first: i64,
    rows: i64,
) -> Result<String> {
    let path = dir.join(format!("{region}.parquet")).to_str().unwrap().to_string();
    let sql = format!(
        "SELECT '{region}' AS region, {first} + {rows} - 1 - value AS pos \
         FROM generate_series(0, {rows} - 1) ORDER BY value"
    );
    write_parquet_file(ctx.sql(&sql).await?, &path).await?;
    Ok(path)
}

#[tokio::test(flavor = "multi_thread")]
#[rstest::rstest]
async fn test_collate_preserves_file_and_row_order(
    ctx: SessionContext,
    workdir: TempDir,
) -> Result<()> {
    let first = write_region(&ctx, workdir.path(), "chr1_a", 0, 5).await?;
    let second = write_region(&ctx, workdir.path(), "chr1_b", 5, 7).await?;
    let output = workdir.path().join("all.parquet").to_str().unwrap().to_string();

    let rows = collate(&ctx, &[first, second], &output).await?;
    assert_eq!(rows, 12);

    let batches = read_parquet_file(&ctx, &output).await?.collect().await?;
    let mut regions = Vec::new();
    let mut positions = Vec::new();
    for batch in &batches {
        let region = cast(batch.column(0), &DataType::Utf8)?;
        let region = region.as_string::<i32>();
        let pos = batch.column(1).as_primitive::<Int64Type>();
        for i in 0..batch.num_rows() {
            regions.push(region.value(i).to_string());
            positions.push(pos.value(i));
        }
    }

    assert_eq!(positions, [4, 3, 2, 1, 0, 11, 10, 9, 8, 7, 6, 5]);
    assert_eq!(regions.iter().filter(|r| *r == "chr1_a").count(), 5);
    assert!(regions[..5].iter().all(|r| r == "chr1_a"));
    assert!(regions[5..].iter().all(|r| r == "chr1_b"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[rstest::rstest]
async fn test_collate_keeps_duplicates(ctx: SessionContext, workdir: TempDir) -> Result<()> {
    let region = write_region(&ctx, workdir.path(), "chr2", 0, 3).await?;
    let output = workdir.path().join("twice.parquet").to_str().unwrap().to_string();

    let rows = collate(&ctx, &[region.clone(), region], &output).await?;
    assert_eq!(rows, 6);
    assert_eq!(read_parquet_file(&ctx, &output).await?.count().await?, 6);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[rstest::rstest]
async fn test_collate_rejects_mismatched_schema(
    ctx: SessionContext,
    workdir: TempDir,
) -> Result<()> {
    let region = write_region(&ctx, workdir.path(), "chr3", 0, 2).await?;
    let other = workdir.path().join("other.parquet").to_str().unwrap().to_string();
    write_parquet_file(ctx.sql("SELECT 1 AS pos, 'x' AS region").await?, &other).await?;
    let output = workdir.path().join("bad.parquet").to_str().unwrap().to_string();

    let err = collate(&ctx, &[region, other.clone()], &output)
        .await
        .unwrap_err();
    assert_contains!(err.to_string(), format!("schema of {other}"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[rstest::rstest]
async fn test_collate_mismatch_leaves_no_output(
    ctx: SessionContext,
    workdir: TempDir,
) -> Result<()> {
    let ints = workdir.path().join("a.parquet").to_str().unwrap().to_string();
    write_parquet_file(ctx.sql("SELECT 1 AS a").await?, &ints).await?;
    let strings = workdir.path().join("b.parquet").to_str().unwrap().to_string();
    write_parquet_file(ctx.sql("SELECT 'x' AS b").await?, &strings).await?;
    let output = workdir.path().join("out.parquet");

    let err = collate(&ctx, &[ints, strings.clone()], output.to_str().unwrap())
        .await
        .unwrap_err();
    assert_contains!(err.to_string(), format!("schema of {strings}"));
    assert!(!output.exists());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[rstest::rstest]
async fn test_collate_requires_inputs(ctx: SessionContext, workdir: TempDir) -> Result<()> {
    let output = workdir.path().join("empty.parquet").to_str().unwrap().to_string();
    let err = collate(&ctx, &[], &output).await.unwrap_err();
    assert_contains!(err.to_string(), "at least one input");
    Ok(())
}
