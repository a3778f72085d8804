//! Hardened HTTP(S) content fetching.
//!
//! The pipeline runs in layers: [`SingleAttemptFetcher`] performs exactly one
//! impersonated request, [`RaceCoordinator`] issues several attempts at once
//! and keeps the best, [`RedirectCookieWalker`] follows redirect chains while
//! accumulating cookies, and [`ResultPackager`] turns the walked chain into a
//! caller-facing [`PackagedResult`]. [`FetchService`] assembles the whole
//! stack.

pub mod attempt;
pub mod classify;
pub mod constants;
pub mod cookies;
pub mod decode;
pub mod error;
pub mod impersonate;
pub mod options;
pub mod package;
pub mod race;
pub mod service;
pub mod walker;

pub use attempt::{AttemptResponse, HeaderBlock, Payload, SingleAttemptFetcher};
pub use classify::TransportErrorKind;
pub use cookies::Cookie;
pub use decode::ContentDecoder;
pub use error::{FetchError, FetchKind};
pub use impersonate::{ImpersonationError, ImpersonationProfile};
pub use options::FetchRequest;
pub use package::{HopRecord, PackagedResult, ResultPackager};
pub use race::RaceCoordinator;
pub use service::FetchService;
pub use walker::{FetchedBody, RedirectCookieWalker, WalkedResult};
