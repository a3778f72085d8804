//! Top-level fetch facade.
//!
//! Wires the attempt fetcher, race coordinator, walker, and packager into two
//! entry points: sideload to a temp file, or sideload into memory.

use std::sync::Arc;

use tracing::instrument;

use super::attempt::SingleAttemptFetcher;
use super::error::FetchError;
use super::impersonate::ImpersonationProfile;
use super::options::FetchRequest;
use super::package::{PackagedResult, ResultPackager};
use super::race::RaceCoordinator;
use super::walker::RedirectCookieWalker;
use crate::support::liveness::LivenessSignal;
use crate::support::proxy::ProxyAllocator;
use crate::support::scope::{PayloadArena, ScopeId};
use crate::support::temp::TempAllocator;

/// The assembled fetch pipeline.
pub struct FetchService {
    walker: RedirectCookieWalker,
    packager: ResultPackager,
    proxy: Option<Arc<dyn ProxyAllocator>>,
}

impl FetchService {
    /// Builds the pipeline with the default impersonation profile and the
    /// environment-configured race width.
    #[must_use]
    pub fn new(
        temp: Arc<dyn TempAllocator>,
        arena: Arc<PayloadArena>,
        liveness: Arc<dyn LivenessSignal>,
    ) -> Self {
        let race = RaceCoordinator::new(SingleAttemptFetcher::default());
        Self {
            walker: RedirectCookieWalker::new(race, temp),
            packager: ResultPackager::new(arena, liveness),
            proxy: None,
        }
    }

    /// Installs a proxy allocator consulted once per fetch when the request
    /// carries no explicit proxy.
    #[must_use]
    pub fn with_proxy_allocator(mut self, proxy: Arc<dyn ProxyAllocator>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Replaces the impersonation profile, keeping the configured race width.
    #[must_use]
    pub fn with_profile(self, profile: ImpersonationProfile) -> Self {
        let attempts = self.walker.race().attempts();
        let race =
            RaceCoordinator::new(SingleAttemptFetcher::new(profile)).with_attempts(attempts);
        Self {
            walker: RedirectCookieWalker::new(race, self.walker.temp()),
            packager: self.packager,
            proxy: self.proxy,
        }
    }

    /// Overrides the race width.
    #[must_use]
    pub fn with_attempts(self, attempts: usize) -> Self {
        let race = self.walker.race().clone().with_attempts(attempts);
        Self {
            walker: RedirectCookieWalker::new(race, self.walker.temp()),
            packager: self.packager,
            proxy: self.proxy,
        }
    }

    /// Resolves the effective request, allocating a proxy when one is
    /// configured and the caller supplied none.
    async fn resolve_request(&self, request: &FetchRequest) -> Result<FetchRequest, FetchError> {
        let Some(allocator) = &self.proxy else {
            return Ok(request.clone());
        };
        if request.proxy_url.is_some() {
            return Ok(request.clone());
        }
        let proxy = allocator.allocate(None).await.map_err(|error| {
            FetchError::unclassified(
                request.url.as_str(),
                format!("proxy allocation failed: {error}"),
            )
        })?;
        Ok(request.clone().with_proxy(proxy))
    }

    /// Fetches `request`, materializing the body to a temp file, and packages
    /// the outcome under `scope`.
    ///
    /// # Errors
    ///
    /// Propagates walk failures (transport, hop budget, cookie preconditions).
    #[instrument(level = "info", skip(self, request), fields(url = %request.url))]
    pub async fn sideload(
        &self,
        scope: ScopeId,
        request: &FetchRequest,
    ) -> Result<PackagedResult, FetchError> {
        let request = self.resolve_request(request).await?;
        let walked = self.walker.fetch_to_file(&request).await?;
        self.packager.package(scope, &request, walked)
    }

    /// Fetches `request`, keeping the body in memory, and packages the
    /// outcome under `scope`.
    ///
    /// # Errors
    ///
    /// Propagates walk failures (transport, hop budget, cookie preconditions).
    #[instrument(level = "info", skip(self, request), fields(url = %request.url))]
    pub async fn sideload_blob(
        &self,
        scope: ScopeId,
        request: &FetchRequest,
    ) -> Result<PackagedResult, FetchError> {
        let request = self.resolve_request(request).await?;
        let walked = self.walker.fetch_to_blob(&request).await?;
        self.packager.package(scope, &request, walked)
    }
}
