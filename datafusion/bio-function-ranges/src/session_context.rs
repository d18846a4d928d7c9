use datafusion::prelude::{SessionConfig, SessionContext};
use log::info;

use crate::table_function::register_ranges_functions;

/// Convenience function: create a [`SessionContext`] with the range table
/// functions (`contained_join`) registered.
pub fn create_bio_session() -> SessionContext {
    create_bio_session_with_config(SessionConfig::new().with_information_schema(true))
}

/// Same as [`create_bio_session`] with a caller-supplied configuration, e.g.
/// one carrying additional config extensions.
pub fn create_bio_session_with_config(config: SessionConfig) -> SessionContext {
    let ctx = SessionContext::new_with_config(config);
    register_ranges_functions(&ctx);
    info!(
        "Initialized bio session with {} target partitions",
        ctx.state().config().target_partitions()
    );
    ctx
}
