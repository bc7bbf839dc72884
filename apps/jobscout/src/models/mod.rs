pub mod job;
pub mod profile;

pub use job::{JobPosting, JobStatus, NormalizedPosting};
pub use profile::{ExperienceLevel, ProfileSearchRequest, RemotePreference, UserProfile};
