//! HTTP discovery endpoint payloads.
//!
//! Chrome exposes `/json/version` and `/json/list` for clients to discover
//! debug targets before opening a WebSocket. The field spellings here are
//! part of the de-facto contract (`Protocol-Version`, `V8-Version`, ...)
//! and are pinned with rename attributes rather than hand-built strings.

use serde::{Deserialize, Serialize};

/// Response body for `/json/version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionPayload {
    /// Browser product string, e.g. "Magi/1.0.0 Chrome/128.0.0.0".
    #[serde(rename = "Browser")]
    pub browser: String,
    /// CDP protocol version.
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    /// User agent string.
    #[serde(rename = "User-Agent")]
    pub user_agent: String,
    /// V8 version.
    #[serde(rename = "V8-Version")]
    pub v8_version: String,
    /// WebKit version tag.
    #[serde(rename = "WebKit-Version")]
    pub webkit_version: String,
    /// Browser-level WebSocket endpoint.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

/// Target kind in `/json/list` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A browser instance.
    Browser,
    /// A page within a browser.
    Page,
}

/// One entry in the `/json/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetListEntry {
    /// Browser id or page id.
    pub id: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: TargetKind,
    /// Browser name or page title.
    pub title: String,
    /// Page URL; omitted for browser entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Whether a debugger client is attached.
    pub attached: bool,
    /// WebSocket endpoint for this target.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
    /// Favicon URL when the page has one.
    #[serde(rename = "faviconUrl", skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
}

/// Response body for `/json/protocol`: a minimal protocol descriptor
/// covering the domains the gateway implements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolDescriptor {
    /// Protocol version.
    pub version: ProtocolVersion,
    /// Implemented domains.
    pub domains: Vec<DomainDescriptor>,
}

/// Protocol version block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// Major version.
    pub major: String,
    /// Minor version.
    pub minor: String,
}

/// One domain in the protocol descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainDescriptor {
    /// Domain name.
    pub domain: String,
    /// Commands the gateway accepts.
    pub commands: Vec<CommandDescriptor>,
    /// Events the gateway emits.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventDescriptor>,
}

/// A command name entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Command name without the domain prefix.
    pub name: String,
}

/// An event name entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Event name without the domain prefix.
    pub name: String,
}

impl ProtocolDescriptor {
    /// The descriptor served by the gateway: Target and Browser domains
    /// with exactly the commands and events the gateway implements.
    #[must_use]
    pub fn magi() -> Self {
        fn commands(names: &[&str]) -> Vec<CommandDescriptor> {
            names
                .iter()
                .map(|name| CommandDescriptor {
                    name: (*name).to_string(),
                })
                .collect()
        }
        fn events(names: &[&str]) -> Vec<EventDescriptor> {
            names
                .iter()
                .map(|name| EventDescriptor {
                    name: (*name).to_string(),
                })
                .collect()
        }

        Self {
            version: ProtocolVersion {
                major: "1".to_string(),
                minor: "3".to_string(),
            },
            domains: vec![
                DomainDescriptor {
                    domain: "Target".to_string(),
                    commands: commands(&[
                        "setDiscoverTargets",
                        "createTarget",
                        "closeTarget",
                        "getTargets",
                        "getTargetInfo",
                        "attachToTarget",
                        "detachFromTarget",
                        "sendMessageToTarget",
                        "setAutoAttach",
                        "getBrowserContexts",
                        "createBrowserContext",
                        "disposeBrowserContext",
                    ]),
                    events: events(&[
                        "targetCreated",
                        "targetDestroyed",
                        "attachedToTarget",
                        "detachedFromTarget",
                        "receivedMessageFromTarget",
                    ]),
                },
                DomainDescriptor {
                    domain: "Browser".to_string(),
                    commands: commands(&["getVersion", "setDownloadBehavior"]),
                    events: vec![],
                },
            ],
        }
    }
}
