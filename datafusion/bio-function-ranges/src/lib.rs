pub mod array_utils;
pub mod contained_join;
pub mod filter_op;
pub mod interval_tree;
pub mod session_context;
pub mod table_function;

// Re-export key types
pub use array_utils::ColTriple;
pub use contained_join::ContainedJoinProvider;
pub use filter_op::FilterOp;
pub use interval_tree::ContainmentIndex;
pub use session_context::{create_bio_session, create_bio_session_with_config};
pub use table_function::register_ranges_functions;
