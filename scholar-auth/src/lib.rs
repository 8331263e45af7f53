//! scholar-auth: identities from hosted-backend access tokens.
//!
//! The backend issues HS256 JWTs. [`IdentityProvider::verify`] checks the
//! signature, expiry and (optionally) audience, then reads `{id, role}`
//! from the claims.

mod identity;

pub use identity::{extract_bearer_token, identity_from_claims, IdentityError, IdentityOptions, IdentityProvider};
