//! Monitored targets.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Label shown for the HTTP endpoint in status lines.
pub const ENDPOINT_LABEL: &str = "API Endpoint";

/// A monitored unit on the watched host.
///
/// Identity is the kind plus the port number or URL; a port's label is
/// presentation only and does not take part in equality or hashing.
#[derive(Debug, Clone)]
pub enum Target {
    Port { number: u16, label: String },
    HttpEndpoint { url: String },
}

impl Target {
    /// A port target. An empty label falls back to `Port <n>`.
    pub fn port(number: u16, label: impl Into<String>) -> Self {
        let label = label.into();
        let label = if label.trim().is_empty() {
            format!("Port {number}")
        } else {
            label
        };
        Target::Port { number, label }
    }

    pub fn endpoint(url: impl Into<String>) -> Self {
        Target::HttpEndpoint { url: url.into() }
    }

    /// Label used in status lines.
    pub fn label(&self) -> &str {
        match self {
            Target::Port { label, .. } => label,
            Target::HttpEndpoint { .. } => ENDPOINT_LABEL,
        }
    }

    /// The well-known set watched when nothing else is configured.
    pub fn default_ports() -> Vec<Target> {
        vec![
            Target::port(22, "SSH"),
            Target::port(80, "HTTP Website"),
            Target::port(443, "HTTPS Website"),
        ]
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Target::Port { number: a, .. }, Target::Port { number: b, .. }) => a == b,
            (Target::HttpEndpoint { url: a }, Target::HttpEndpoint { url: b }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Target::Port { number, .. } => {
                0u8.hash(state);
                number.hash(state);
            }
            Target::HttpEndpoint { url } => {
                1u8.hash(state);
                url.hash(state);
            }
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Port { number, label } => write!(f, "{label} (port {number})"),
            Target::HttpEndpoint { url } => write!(f, "API endpoint {url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_ignores_label() {
        assert_eq!(Target::port(22, "SSH"), Target::port(22, "Secure Shell"));
        assert_ne!(Target::port(22, "SSH"), Target::port(2222, "SSH"));

        let set: HashSet<Target> = [Target::port(80, "a"), Target::port(80, "b")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_kinds_never_equal() {
        assert_ne!(Target::port(80, "HTTP"), Target::endpoint("http://host:80"));
    }

    #[test]
    fn test_blank_label_falls_back_to_port_number() {
        assert_eq!(Target::port(8080, "").label(), "Port 8080");
        assert_eq!(Target::endpoint("http://x/api").label(), ENDPOINT_LABEL);
    }
}
