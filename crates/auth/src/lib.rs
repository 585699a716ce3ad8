//! `warehouse-auth` — authentication boundary.
//!
//! Token issuing/verification and credential checks. This crate is
//! intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod credentials;
pub mod jwt;
pub mod principal;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use credentials::{CredentialVerifier, StaticCredentials};
pub use jwt::{Hs256TokenService, IssuedToken, JwtIssuer, JwtValidator, TokenError};
pub use principal::PrincipalId;
