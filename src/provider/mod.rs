//! Identity provider (Supabase GoTrue) access: HTTP client, access-token
//! JWT helpers and PKCE.

pub mod client;
pub mod jwt;
pub mod pkce;

pub use client::{OAuthSignIn, OtpType, ProviderClient, ProviderError, VerifyOtp};
