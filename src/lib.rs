//! # sidefetch
//!
//! A hardened HTTP(S) content-fetching layer for targets that resist plain
//! clients. Requests go out dressed as a real Chrome browser, every hop is
//! raced across several concurrent attempts, redirect chains are walked with
//! a cookie jar that honors set-and-retry preconditions, and transport
//! failures are digested into a small severity taxonomy callers can act on.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sidefetch::{FetchRequest, FetchService, NoopLiveness, PayloadArena, TempFileAllocator};
//! use url::Url;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let temp = Arc::new(TempFileAllocator::new()?);
//! let arena = Arc::new(PayloadArena::new());
//! let service = FetchService::new(temp, Arc::clone(&arena), Arc::new(NoopLiveness));
//!
//! let scope = arena.open_scope();
//! let request = FetchRequest::new(Url::parse("https://example.com/report.pdf")?);
//! let result = service.sideload(scope, &request).await?;
//! println!("{} -> {}", result.final_url, result.content_type);
//! arena.release(scope);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod fetch;
pub mod support;

pub use fetch::{
    AttemptResponse, Cookie, FetchError, FetchKind, FetchRequest, FetchService, FetchedBody,
    HeaderBlock, HopRecord, ImpersonationProfile, PackagedResult, Payload, RaceCoordinator,
    RedirectCookieWalker, ResultPackager, SingleAttemptFetcher, WalkedResult,
};
pub use support::{
    CountingLiveness, LivenessSignal, NoopLiveness, PayloadArena, ProxyAllocator, ProxyError,
    ScopeId, StaticProxyAllocator, TempAllocator, TempFileAllocator,
};
