pub mod batch;
pub mod pipeline;
pub mod reader;
pub mod resolver;
pub mod retry;

pub use batch::{BatchOutcome, BatchScheduler};
pub use pipeline::{BuildOptions, BuildReport, HierarchyBuilder};
pub use reader::HierarchyQueries;
pub use resolver::{decode_id_code_batches, GenericHierarchyResolver};
pub use retry::{RetryPolicy, TransientClassifier};
