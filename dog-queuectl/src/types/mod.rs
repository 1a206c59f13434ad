pub mod ids;
pub mod record;
pub mod snapshot;
pub mod status;

pub use ids::{JobId, WorkerId};
pub use record::{Job, JobState};
pub use snapshot::{Snapshot, WorkerRecord};
pub use status::QueueStatus;
