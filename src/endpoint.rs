//! WebSocket endpoint addresses.
//!
//! An [`Endpoint`] is a validated `ws://` or `wss://` URL. Scheme
//! selection follows the hosting page: an `https` page talks to `wss`,
//! a plain `http` page to `ws`.
//!
//! # Example
//!
//! ```
//! use chat_channel::Endpoint;
//!
//! # fn example() -> chat_channel::Result<()> {
//! let endpoint = Endpoint::for_page("https://app.example.com/chat/7/", "/chat/7/")?
//!     .with_token("s3cr3t");
//! assert_eq!(endpoint.as_str(), "wss://app.example.com/chat/7/?token=s3cr3t");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Endpoint
// ============================================================================

/// A validated websocket address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Parses and validates a websocket address.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the string is not a URL
    /// - [`Error::InvalidEndpoint`] if the scheme is not `ws`/`wss` or the
    ///   host is missing
    pub fn parse(address: &str) -> Result<Self> {
        let url = Url::parse(address)?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::invalid_endpoint(
                address,
                "scheme must be ws or wss",
            ));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::invalid_endpoint(address, "missing host"));
        }

        Ok(Self { url })
    }

    /// Builds the endpoint for `path` on the host serving `page_url`.
    ///
    /// `http` maps to `ws` and `https` to `wss`; host and port are kept,
    /// query and fragment of the page are dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `page_url` is not a URL
    /// - [`Error::InvalidEndpoint`] if the page is not served over http(s)
    pub fn for_page(page_url: &str, path: &str) -> Result<Self> {
        let mut url = Url::parse(page_url)?;

        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(Error::invalid_endpoint(
                    page_url,
                    format!("cannot derive websocket scheme from '{other}'"),
                ));
            }
        };

        url.set_scheme(scheme)
            .map_err(|()| Error::invalid_endpoint(page_url, "scheme change rejected"))?;
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);

        Self::parse(url.as_str())
    }

    /// Appends an auth token as the `token` query parameter.
    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.url.query_pairs_mut().append_pair("token", token);
        self
    }

    /// Returns `true` for `wss://` endpoints.
    #[inline]
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }

    /// Returns the address as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Endpoint {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
