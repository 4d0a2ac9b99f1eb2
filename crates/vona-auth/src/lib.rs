//! Vona Authentication Library
//!
//! Verification of provider-issued bearer tokens and telephony webhook
//! signatures. Tokens are issued by the external identity provider; this
//! crate only validates them and exposes the authenticated subject to
//! handlers. Admin authorization is decided by the `is_admin` flag on the
//! account row, not by a token claim.

pub mod claims;
pub mod middleware;
pub mod signature;
pub mod token;

pub use claims::Claims;
pub use middleware::AuthenticatedUser;
pub use signature::WebhookVerifier;
pub use token::TokenVerifier;
