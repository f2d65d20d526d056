//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `GatewayAuth` - the trusted gateway forwarding a verified end user
//! - `AdminAuth` - admin authentication for privileged endpoints
//!
//! Identity verification itself happens upstream: the gateway (bot
//! frontend) proves who the end user is on its platform and forwards only
//! the stable external id. This service authenticates the gateway, not the
//! end user.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::AppState;

/// A verified end-user identity forwarded by the authenticated gateway.
#[derive(Debug, Clone)]
pub struct GatewayAuth {
    /// Stable external user identifier (e.g. a messaging-platform user id).
    pub external_id: String,
}

impl FromRequestParts<Arc<AppState>> for GatewayAuth {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let api_key = parts
                .headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .ok_or(ApiError::Unauthorized)?;

            let expected_key = state
                .config
                .service_api_key
                .as_ref()
                .ok_or(ApiError::Unauthorized)?;

            if api_key != expected_key {
                return Err(ApiError::Unauthorized);
            }

            let external_id = parts
                .headers
                .get("x-external-id")
                .and_then(|v| v.to_str().ok())
                .filter(|s| !s.is_empty())
                .ok_or(ApiError::Unauthorized)?
                .to_string();

            Ok(GatewayAuth { external_id })
        })
    }
}

/// Admin authentication via API key.
///
/// Used for admin-only endpoints like manual top-ups. Requires the
/// `X-Admin-Key` header to match the configured admin key.
#[derive(Debug, Clone)]
pub struct AdminAuth;

impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let admin_key = parts
                .headers
                .get("x-admin-key")
                .and_then(|v| v.to_str().ok())
                .ok_or(ApiError::Unauthorized)?;

            let expected_key = state
                .config
                .admin_api_key
                .as_ref()
                .ok_or(ApiError::Unauthorized)?;

            if admin_key != expected_key {
                return Err(ApiError::Unauthorized);
            }

            Ok(AdminAuth)
        })
    }
}
