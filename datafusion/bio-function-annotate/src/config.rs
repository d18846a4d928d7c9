use datafusion::common::extensions_options;
use datafusion::config::ConfigExtension;
use datafusion::prelude::SessionContext;

extensions_options! {
    /// Imputation defaults and diagnostics for the annotation merge.
    ///
    /// Registered under the `annotate` prefix, e.g.
    /// `SET annotate.validate_join_keys = true`.
    pub struct AnnotateConfig {
        /// Fill value for unmatched allele-frequency columns.
        pub af_fill: f64, default = 1e-7
        /// Fill value for unmatched pathogenicity scores.
        pub pathogenicity_fill: f64, default = 0.0
        /// Warn when an annotation source has duplicate join keys.
        pub validate_join_keys: bool, default = false
        /// Rows shown in intermediate table previews.
        pub preview_rows: usize, default = 5
    }
}

impl ConfigExtension for AnnotateConfig {
    const PREFIX: &'static str = "annotate";
}

impl AnnotateConfig {
    /// Read the extension from a session, falling back to defaults when the
    /// session was built without it.
    pub fn from_session(ctx: &SessionContext) -> Self {
        ctx.state()
            .config_options()
            .extensions
            .get::<AnnotateConfig>()
            .cloned()
            .unwrap_or_default()
    }
}
