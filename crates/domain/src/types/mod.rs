//! Domain types and models

pub mod deferred;
pub mod request;
pub mod response;
pub mod session;

pub use deferred::{DeferredEntry, PersistedDeferrals, ReplayReport};
pub use request::{HttpMethod, RequestBuilder, RequestContext, RequestDescriptor, RetryPolicy};
pub use response::{FailureKind, NetworkError, Response};
pub use session::{LinkQuality, SessionState, SubscriberId};
