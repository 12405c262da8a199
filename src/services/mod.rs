//! Business logic services
//!
//! Page data fetchers and the post composer. Services take the caller's
//! `SessionContext` explicitly and never consult global session state.

pub mod composer;
pub mod fetch;
pub mod post;
pub mod profile;

pub use composer::{Composer, ComposerForm, LOGIN_REQUIRED};
pub use fetch::FetchState;
pub use post::PostService;
pub use profile::{ProfileOutcome, ProfileService, ProfileView};
