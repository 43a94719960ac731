//! # cb-services
//!
//! Session-level orchestration over the cb-core ports: identity resolution,
//! reaction toggling, feed and thread reads, and validated submissions.

pub mod feed;
pub mod identity;
pub mod reactions;
pub mod session;
pub mod submission;

pub use feed::{FeedService, FeedSort, DEFAULT_PAGE_SIZE};
pub use identity::{IdentityResolver, RandomIdSource, Resolution, ResolutionSource, ResolverConfig};
pub use reactions::{next_state, ReactionChange, ReactionCoordinator};
pub use session::{RefreshTarget, RequestGuard, RequestTicket, Session};
pub use submission::{Attachment, ConfessionDraft, SubmissionLimits};
