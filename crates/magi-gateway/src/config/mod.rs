//! Gateway configuration.

use std::net::SocketAddr;

use crate::mux::ReadinessConfig;

/// Environment flag that enables the non-production test endpoints.
const TEST_ENDPOINTS_ENV: &str = "MAGI_TEST_ENDPOINTS";

/// Configuration for a [`CdpGateway`](crate::CdpGateway).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on. The gateway is expected to bind loopback;
    /// it performs no client authentication.
    pub bind_addr: SocketAddr,
    /// Authority (`host:port`) to advertise in WebSocket URLs; the bound
    /// address when absent.
    pub advertised_host: Option<String>,
    /// User agent reported by discovery when a browser has no override.
    pub user_agent: String,
    /// Debugger-readiness wait tuning.
    pub readiness: ReadinessConfig,
    /// Whether `/test/browser/*` endpoints are served. Defaults to the
    /// `MAGI_TEST_ENDPOINTS` environment flag and must stay off in
    /// production.
    pub enable_test_endpoints: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9222)),
            advertised_host: None,
            user_agent: "Magi/1.0.0".to_string(),
            readiness: ReadinessConfig::default(),
            enable_test_endpoints: std::env::var(TEST_ENDPOINTS_ENV)
                .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
        }
    }
}

impl GatewayConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listen address.
    #[must_use]
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the advertised authority.
    #[must_use]
    pub fn advertised_host(mut self, host: impl Into<String>) -> Self {
        self.advertised_host = Some(host.into());
        self
    }

    /// Set the default user agent.
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    /// Set the readiness wait tuning.
    #[must_use]
    pub fn readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    /// Enable or disable the non-production test endpoints.
    #[must_use]
    pub fn test_endpoints(mut self, enabled: bool) -> Self {
        self.enable_test_endpoints = enabled;
        self
    }
}
