pub mod ccre;
pub mod collate;
pub mod config;
pub mod finalize;
pub mod merge;
pub mod parquet_io;
pub mod pipeline;
pub mod schema_contract;
pub mod sources;
pub mod variants;

use datafusion::prelude::{SessionConfig, SessionContext};
use datafusion_bio_function_ranges::create_bio_session_with_config;

// Re-export key types
pub use ccre::read_ccre_atlas;
pub use collate::collate;
pub use config::AnnotateConfig;
pub use finalize::finalize;
pub use merge::{merge_allele_frequencies, merge_ccre, merge_pathogenicity, merge_regulatory};
pub use parquet_io::{ParquetSink, read_parquet_file, write_parquet_file};
pub use pipeline::{AnnotationInputs, annotate_region};
pub use schema_contract::{ColumnReconciliation, reconcile_columns};
pub use sources::{AlleleFrequencySource, PathogenicitySource, RegulatorySource};
pub use variants::{RegionWindow, read_variant_headers, read_variant_table, variant_window};

/// Create a session carrying [`AnnotateConfig`] with the range table
/// functions registered.
pub fn create_annotate_session() -> SessionContext {
    create_annotate_session_with_config(AnnotateConfig::default())
}

/// Same as [`create_annotate_session`] with explicit annotation options.
pub fn create_annotate_session_with_config(options: AnnotateConfig) -> SessionContext {
    let config = SessionConfig::new()
        .with_information_schema(true)
        .with_option_extension(options);
    create_bio_session_with_config(config)
}

/// Session for the collator: one target partition so every input file is
/// scanned as a single ordered stream.
pub fn create_collate_session() -> SessionContext {
    let config = SessionConfig::new()
        .with_target_partitions(1)
        .with_repartition_file_scans(false);
    SessionContext::new_with_config(config)
}
