//! Protocol Module
//!
//! Builds the single JSON-RPC style handshake each probe sends and encodes it
//! as one newline-terminated line. The response is never parsed.

use crate::config::{Credentials, ProtocolVariant};
use serde::Serialize;

/// Client identifier announced by `mining.subscribe`
pub const CLIENT_ID: &str = "stratum-ping/1.0.0";

/// Protocol version announced by `mining.subscribe`
pub const STRATUM_VERSION: &str = "EthereumStratum/1.0.0";

/// Handshake request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StratumRequest {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<&'static str>,
    pub method: &'static str,
    pub params: Vec<String>,
}

/// Build the handshake for `variant`.
///
/// Credentials are only read by [`ProtocolVariant::StratumV1`].
pub fn build_request(variant: ProtocolVariant, credentials: &Credentials) -> StratumRequest {
    match variant {
        ProtocolVariant::StratumV1 => StratumRequest {
            id: 1,
            jsonrpc: Some("2.0"),
            method: "eth_submitLogin",
            params: vec![credentials.login.clone(), credentials.password.clone()],
        },
        ProtocolVariant::StratumV2 => StratumRequest {
            id: 1,
            jsonrpc: None,
            method: "mining.subscribe",
            params: vec![CLIENT_ID.to_string(), STRATUM_VERSION.to_string()],
        },
    }
}

/// Encode a request as a single newline-terminated JSON line
pub fn encode_line(request: &StratumRequest) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    Ok(line)
}
