//! The task catalog (C10): one module per job type the worker pool can
//! dispatch. Each module owns its input/output shapes and its own
//! grounding in the domain; this crate wires them to the generic
//! [`jobworker_runtime::task::Task`] trait and, where needed, to C4's
//! cache-through reader and C1's structured logger.

pub mod auth_logout;
pub mod email_send;
pub mod es_query;
pub mod fast_store;
pub mod match_score;
pub mod numeric;
pub mod priority_routing;
pub mod readiness_score;
pub mod relevance_ranking;
pub mod response_build;
pub mod session_store;
pub mod system_of_record;

pub use auth_logout::AuthLogoutTask;
pub use email_send::EmailSendTask;
pub use es_query::EsQueryTask;
pub use fast_store::RedisFastStore;
pub use match_score::MatchScoreTask;
pub use priority_routing::PriorityRoutingTask;
pub use readiness_score::ReadinessScoreTask;
pub use relevance_ranking::RelevanceRankingTask;
pub use response_build::ResponseBuildTask;
pub use session_store::SessionStore;
pub use system_of_record::{FranchiseAccountLoader, UserProfileLoader};
