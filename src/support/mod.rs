//! Infrastructure seams around the fetch pipeline: proxy allocation, temp
//! file management, payload lifetimes, and liveness signalling.

pub mod liveness;
pub mod proxy;
pub mod scope;
pub mod temp;

pub use liveness::{CountingLiveness, LivenessSignal, NoopLiveness};
pub use proxy::{ProxyAllocator, ProxyError, StaticProxyAllocator};
pub use scope::{PayloadArena, ScopeId};
pub use temp::{TempAllocator, TempFileAllocator};
