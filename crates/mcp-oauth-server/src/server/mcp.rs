//! Protected MCP resource endpoint (JSON-RPC 2.0 over `POST /mcp`).
//!
//! `initialize` and `ping` are open; listing and calling tools requires a
//! valid bearer token. A rejected request gets 401 with a `WWW-Authenticate`
//! challenge pointing at the protected resource metadata. Calling a tool also
//! requires the `mcp:tools:execute` scope, else 403 `insufficient_scope`.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::transport::HttpState;
use crate::error::OAuthError;
use crate::oauth::AccessClaims;

/// Scope needed for `tools/call`.
pub const EXECUTE_SCOPE: &str = "mcp:tools:execute";

/// JSON-RPC error codes.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    const VERSION: &'static str = "2.0";

    #[must_use]
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self { jsonrpc: Cow::Borrowed(Self::VERSION), result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            result: None,
            error: Some(JsonRpcError { code, message: message.into() }),
            id,
        }
    }
}

/// MCP tool info for tools/list response.
#[derive(Debug, Serialize)]
pub struct McpToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Tools exposed to authenticated callers.
fn tool_list() -> Vec<McpToolInfo> {
    vec![
        McpToolInfo {
            name: "get_user_profile",
            description: "Return the authenticated subject, client and granted scope",
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        },
        McpToolInfo {
            name: "get_server_time",
            description: "Return the current server time in UTC",
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        },
    ]
}

/// `POST /mcp`
pub async fn handle_mcp_post(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    payload: Result<Json<JsonRpcRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Unparseable JSON-RPC request");
            return Json(JsonRpcResponse::error(None, codes::PARSE_ERROR, "Parse error"))
                .into_response();
        }
    };

    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::error(
            req.id,
            codes::INVALID_REQUEST,
            "Invalid Request: jsonrpc must be \"2.0\"",
        ))
        .into_response();
    }

    tracing::debug!(method = %req.method, "Handling MCP request");

    let response = match req.method.as_str() {
        "initialize" => JsonRpcResponse::success(req.id, handle_initialize(&state, &req.params)),
        "ping" => JsonRpcResponse::success(req.id, serde_json::json!({})),
        "notifications/initialized" if req.id.is_none() => {
            return StatusCode::ACCEPTED.into_response();
        }
        "tools/list" | "tools/call" => {
            let claims = match authenticate(&state, &headers) {
                Ok(claims) => claims,
                Err(response) => return response,
            };
            if req.method == "tools/list" {
                JsonRpcResponse::success(req.id, serde_json::json!({ "tools": tool_list() }))
            } else {
                if let Err(err) = require_scope(&claims, EXECUTE_SCOPE) {
                    return err.into_response();
                }
                handle_tools_call(req.id, &req.params, &claims)
            }
        }
        _ => JsonRpcResponse::error(
            req.id,
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Json(response).into_response()
}

/// Verify the bearer credential or build the 401 challenge.
fn authenticate(state: &HttpState, headers: &HeaderMap) -> Result<AccessClaims, Response> {
    let authorization = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());

    state.auth.verify_bearer(authorization).map_err(|err| {
        let presented = authorization.is_some();
        tracing::debug!(presented, "Rejected MCP request without valid bearer token");

        let challenge = state.auth.www_authenticate(presented);
        let mut response = err.into_response_with_status(StatusCode::UNAUTHORIZED);
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        response
    })
}

fn require_scope(claims: &AccessClaims, scope: &str) -> Result<(), OAuthError> {
    if claims.has_scope(scope) {
        return Ok(());
    }
    tracing::debug!(client_id = %claims.client_id, scope, "Token lacks required scope");
    Err(OAuthError::InsufficientScope(scope.to_string()))
}

fn handle_initialize(state: &HttpState, params: &serde_json::Value) -> serde_json::Value {
    let protocol_version =
        params.get("protocolVersion").and_then(|v| v.as_str()).unwrap_or("2025-06-18");

    tracing::info!("MCP initialize: protocol version {}", protocol_version);

    let config = state.auth.config();
    serde_json::json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": config.mcp_server_name,
            "version": config.mcp_server_version
        }
    })
}

fn handle_tools_call(
    id: Option<serde_json::Value>,
    params: &serde_json::Value,
    claims: &AccessClaims,
) -> JsonRpcResponse {
    let Some(tool_name) = params.get("name").and_then(|v| v.as_str()) else {
        return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "Missing 'name' parameter");
    };

    let result = match tool_name {
        "get_user_profile" => serde_json::json!({
            "subject": claims.sub,
            "client_id": claims.client_id,
            "scope": claims.scope
        }),
        "get_server_time" => serde_json::json!({
            "utc": Utc::now().to_rfc3339()
        }),
        _ => {
            return JsonRpcResponse::error(
                id,
                codes::INVALID_PARAMS,
                format!("Tool not found: {tool_name}"),
            );
        }
    };

    tracing::info!(tool = %tool_name, client_id = %claims.client_id, "Executed tool");

    JsonRpcResponse::success(
        id,
        serde_json::json!({
            "content": [{
                "type": "text",
                "text": result.to_string()
            }]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> AccessClaims {
        AccessClaims {
            sub: "mock_user_123".into(),
            client_id: "client_abc".into(),
            scope: "mcp:tools:read".into(),
            iss: "https://example.com".into(),
            aud: "https://example.com".into(),
            iat: 0,
            exp: 1,
            jti: "j".into(),
        }
    }

    #[test]
    fn test_user_profile_tool() {
        let response = handle_tools_call(
            Some(serde_json::json!(1)),
            &serde_json::json!({ "name": "get_user_profile" }),
            &claims(),
        );
        let result = response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        let profile: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(profile["subject"], "mock_user_123");
        assert_eq!(profile["client_id"], "client_abc");
    }

    #[test]
    fn test_unknown_tool() {
        let response = handle_tools_call(None, &serde_json::json!({ "name": "rm_rf" }), &claims());
        assert_eq!(response.error.unwrap().code, codes::INVALID_PARAMS);
    }

    #[test]
    fn test_missing_tool_name() {
        let response = handle_tools_call(None, &serde_json::json!({}), &claims());
        assert!(response.error.is_some());
    }

    #[test]
    fn test_execute_scope_required() {
        let read_only = claims();
        assert_eq!(
            require_scope(&read_only, EXECUTE_SCOPE).unwrap_err(),
            OAuthError::InsufficientScope(EXECUTE_SCOPE.into())
        );

        let granted = AccessClaims { scope: "mcp:tools:read mcp:tools:execute".into(), ..claims() };
        assert!(require_scope(&granted, EXECUTE_SCOPE).is_ok());
    }

    #[test]
    fn test_invalid_token_body() {
        let body = OAuthError::InvalidToken.body();
        assert_eq!(body.error, "invalid_token");
    }
}
