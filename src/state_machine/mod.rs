mod job;
mod machine;
mod state;
mod tag;

pub use job::{Job, JobPatch, JobStatus};
pub use machine::{JobStateMachine, TaggedJob};
pub use state::{StateMachine, Transition};
pub use tag::VersionTag;
