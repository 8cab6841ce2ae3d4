//! Upload/download job state machines and the registry that owns them
//! (`spec.md` §4.6, §4.7).

mod download;
mod pending;
mod terminal;
mod upload;

pub use download::DownloadJob;
pub use pending::PendingJobs;
pub use upload::{TempfileUploadJob, UploadJob};
