pub mod config;
pub mod error;
pub mod job_type;
pub mod priority;

pub use config::{load_dotenv, SchedulerConfig};
pub use error::*;
pub use job_type::{JobType, JobTypeSpec};
pub use priority::Priority;
