//! Version identity advertised by the gateway.

/// Product string reported in discovery payloads and Browser.getVersion.
pub(crate) const PRODUCT: &str = "Magi/1.0.0 Chrome/128.0.0.0";

/// CDP protocol version.
pub(crate) const PROTOCOL_VERSION: &str = "1.3";

/// V8 version matching the embedded engine.
pub(crate) const V8_VERSION: &str = "12.8.21";

/// WebKit version tag matching the embedded engine.
pub(crate) const WEBKIT_VERSION: &str = "537.36 (@9e3e4bc6f09dc45ab4f1a7bcae0cf5a3e7d4)";

/// Revision reported by Browser.getVersion.
pub(crate) const REVISION: &str = "@9e3e4bc6f09dc45ab4f1a7bcae0cf5a3e7d4";
