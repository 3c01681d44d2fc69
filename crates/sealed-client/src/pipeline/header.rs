//! Header injection and token capture
//!
//! Outgoing requests get the session id, a fresh request id, the client id
//! and whatever credentials the context holds. Empty credentials are left
//! off rather than sent blank. Incoming responses may rotate the access and
//! refresh tokens; those are written back to the context.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sealed_transport::{TransportRequest, TransportResponse};
use tracing::debug;
use uuid::Uuid;

use super::{Stage, StageContext, StageError, StageKind};
use crate::constants::{
    ACCESS_TOKEN_HEADER, API_KEY_HEADER, AUTH_TOKEN_HEADER, CLIENT_ID_HEADER,
    REFRESH_TOKEN_HEADER, REQUEST_ID_HEADER, SESSION_ID_HEADER,
};
use crate::context::ContextKey;

/// Generate a request id: `req_` + 32 hex chars.
pub fn new_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderStage;

impl HeaderStage {
    pub fn new() -> Self {
        Self
    }
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), StageError> {
    let header_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| StageError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| StageError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    headers.insert(header_name, header_value);
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl Stage for HeaderStage {
    fn kind(&self) -> StageKind {
        StageKind::Header
    }

    fn on_request(
        &self,
        request: &mut TransportRequest,
        cx: &StageContext<'_>,
    ) -> Result<(), StageError> {
        let snapshot = cx.snapshot;
        let headers = &mut request.headers;

        insert(headers, SESSION_ID_HEADER, snapshot.get(ContextKey::SessionId))?;
        insert(headers, REQUEST_ID_HEADER, &new_request_id())?;

        let api_key = snapshot.get(ContextKey::ApiKey);
        if !api_key.is_empty() {
            insert(headers, API_KEY_HEADER, api_key)?;
        }

        let access_token = snapshot.get(ContextKey::AccessToken);
        if !access_token.is_empty() {
            let selector = match snapshot.get(ContextKey::AuthHeaderSelector) {
                "" => ACCESS_TOKEN_HEADER,
                name => name,
            };
            insert(headers, selector, access_token)?;
        }

        let client_id = snapshot.get(ContextKey::ClientId);
        if !client_id.is_empty() {
            insert(headers, CLIENT_ID_HEADER, client_id)?;
        }
        Ok(())
    }

    fn on_response(
        &self,
        response: &mut TransportResponse,
        cx: &StageContext<'_>,
    ) -> Result<(), StageError> {
        let headers = &response.headers;

        // x-access-token wins when the server sends both
        let access_token = header_str(headers, ACCESS_TOKEN_HEADER)
            .or_else(|| header_str(headers, AUTH_TOKEN_HEADER));
        if let Some(token) = access_token {
            cx.context.set(ContextKey::AccessToken, token)?;
            debug!("access token updated from response");
        }

        if let Some(token) = header_str(headers, REFRESH_TOKEN_HEADER) {
            cx.context.set(ContextKey::RefreshToken, token)?;
            debug!("refresh token updated from response");
        }
        Ok(())
    }
}
