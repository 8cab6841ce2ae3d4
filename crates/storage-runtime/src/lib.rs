//! Dispatcher-side runtime for the storage provider service.
//!
//! Everything here runs on the single dispatcher task (`spec.md` §2, §5):
//! peer credential caching, disconnect tracking, the inactivity timer, the
//! pending-job registry, and the main-loop executor that lets
//! `spawn_blocking` work post its result back without a lock. None of it
//! knows about any particular back-end; `storage-core::Provider`
//! implementations are driven from here but never referenced by name.

pub mod account;
pub mod disconnect;
pub mod inactivity;
pub mod jobs;
pub mod main_loop;
pub mod peer_cache;

pub use account::AccountSession;
pub use disconnect::DisconnectWatcher;
pub use inactivity::InactivityTimer;
pub use jobs::{DownloadJob, PendingJobs, TempfileUploadJob, UploadJob};
pub use main_loop::{MainLoopExecutor, MainLoopReceiver};
pub use peer_cache::{
    DbusPeerCredentialSource, DynPeerCredentialCache, PeerCredentialCache, PeerCredentialSource,
    PeerCredentials,
};
