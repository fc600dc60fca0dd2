//! Building the socket address for one attempt.
//!
//! ```text
//! {ws|wss}://{host}/parties/{party}/{room}?{data..}&userId={id}
//! {ws|wss}://{host}/party/{room}?_pk={id}
//! ```

use indexmap::IndexMap;
use roomlink_config::RoomConfig;

use crate::auth::AuthParams;

const SCHEMES: [&str; 4] = ["https://", "http://", "wss://", "ws://"];
const LOCAL_PREFIXES: [&str; 2] = ["localhost:", "127.0.0.1:"];

/// The resolved target of one socket attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAddress {
    /// Host, possibly still carrying a scheme prefix.
    pub host: String,
    /// Room identifier.
    pub room: String,
    /// Optional party (namespace).
    pub party: Option<String>,
    /// The session's user identifier.
    pub user_id: String,
    /// Explicit scheme override.
    pub protocol: Option<String>,
    /// Query parameters supplied by authentication.
    pub query: Option<IndexMap<String, String>>,
}

impl RoomAddress {
    /// Resolve the address for an attempt.
    ///
    /// Host, room and query data returned by authentication take precedence
    /// over the static configuration.
    pub fn resolve(config: &RoomConfig, user_id: &str, params: &AuthParams) -> Self {
        Self {
            host: non_empty(params.host.as_deref()).unwrap_or(&config.host).to_string(),
            room: non_empty(params.room.as_deref()).unwrap_or(&config.room).to_string(),
            party: config.party.clone(),
            user_id: user_id.to_string(),
            protocol: config.protocol.clone(),
            query: params.data.clone(),
        }
    }

    /// The URL scheme to use.
    pub fn scheme(&self) -> &str {
        if let Some(protocol) = self.protocol.as_deref() {
            return protocol;
        }
        let host = strip_scheme(&self.host);
        if LOCAL_PREFIXES.iter().any(|p| host.starts_with(p)) {
            "ws"
        } else {
            "wss"
        }
    }

    /// Render the full URL.
    ///
    /// Query keys and values are percent-encoded, so a space is sent as
    /// `%20` rather than the form-style `+`.
    pub fn url(&self) -> String {
        let host = strip_scheme(&self.host);
        let path = match &self.party {
            Some(party) => format!("parties/{party}/{}", self.room),
            None => format!("party/{}", self.room),
        };

        let query = match &self.query {
            Some(data) => {
                let mut params = data.clone();
                params.insert("userId".to_string(), self.user_id.clone());
                encode_query(&params)
            }
            None => format!("_pk={}", urlencoding::encode(&self.user_id)),
        };

        format!("{}://{host}/{path}?{query}", self.scheme())
    }
}

/// Strip one leading `http`, `https`, `ws` or `wss` scheme.
pub fn strip_scheme(host: &str) -> &str {
    SCHEMES
        .iter()
        .find_map(|scheme| host.strip_prefix(scheme))
        .unwrap_or(host)
}

/// Percent-encode every key and value. Spaces become `%20`, never `+`.
fn encode_query(params: &IndexMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
