//! Extension contracts for attaching impersonated credentials to outbound requests.
//!
//! [`RequestSignerExt`] keeps the header provider independent from any HTTP client; adapters
//! for `http::Request` and (with the `reqwest` feature) `reqwest::RequestBuilder` ship here.

pub mod request_signer;

pub use request_signer::*;
