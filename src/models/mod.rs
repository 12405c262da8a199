//! Data models
//!
//! Read-through copies of the rows owned by the hosted backend, plus the
//! session types the auth layer hands around:
//! - Posts and their author join
//! - Profiles
//! - Users, auth sessions and the per-client session state

mod post;
mod profile;
mod session;
mod user;

pub use post::{AuthorRef, NewPost, Post, PostSummary, PostWithAuthor, AUTHOR_EMBED};
pub use profile::Profile;
pub use session::{AuthSession, ClientId, SessionState};
pub use user::User;
