use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderMap, request::Parts},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use super::{ApiError, ApiJson, ApiResponse, AppState, MessageResponse};
use crate::services::ContactMessage;

/// Caller address used as the rate-limit key.
///
/// Forwarding headers are honoured only when the socket peer is one of the
/// configured trusted proxies; otherwise anyone could pick their own key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

impl ClientIp {
    #[must_use]
    pub fn key(&self) -> String {
        self.0
            .map_or_else(|| "unknown".to_string(), |ip| ip.to_string())
    }
}

/// Walks `X-Forwarded-For` from the right, skipping our own proxies.
///
/// Entries left of the last trusted hop were written by the client and are
/// never used as the key.
fn forwarded_ip(headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    if let Some(xff) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        let mut hops = xff.rsplit(',').map(|hop| hop.trim().parse::<IpAddr>());
        return match hops.find(|hop| !matches!(hop, Ok(ip) if trusted_proxies.contains(ip))) {
            Some(Ok(ip)) => Some(ip),
            // garbage or an all-proxy chain
            _ => None,
        };
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

pub(crate) fn resolve_client_ip(
    peer: Option<IpAddr>,
    headers: &HeaderMap,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    match peer {
        Some(peer) if trusted_proxies.contains(&peer) => {
            forwarded_ip(headers, trusted_proxies).or(Some(peer))
        }
        Some(peer) => Some(peer),
        None => None,
    }
}

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Self(resolve_client_ip(
            peer,
            &parts.headers,
            &state.trusted_proxies,
        )))
    }
}

/// POST /contact
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    client: ClientIp,
    ApiJson(payload): ApiJson<ContactMessage>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .contact_service()
        .send(&client.key(), &payload)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Message sent",
    ))))
}
