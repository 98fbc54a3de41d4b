// Session module - resolves the auth service's session cookie into a bearer token

pub mod auth_client;
pub mod cookies;
pub mod resolver;

pub use auth_client::{AuthClient, AuthError};
pub use cookies::{CookieAttrs, CookieMutation, Session};
pub use resolver::{SessionResolution, SessionResolver};
