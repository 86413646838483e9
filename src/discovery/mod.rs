//! Discovery pipeline: request state, stage machine and the engine that
//! drives them.

pub mod engine;
pub mod error;
pub mod request;
pub mod state;
pub mod types;

pub use engine::{Discoverer, ResultSink};
pub use error::DiscoveryError;
pub use request::{DiscoveryRequest, FailureTally, FetchedPage};
pub use state::{ExhaustionReason, Stage, StageFacts, next_stage};
pub use types::{
    AppDetails, Candidate, DiscoveryResponse, DocumentKind, SourceStage, dedupe_candidates,
    rank_candidates,
};
