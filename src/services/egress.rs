use crate::constants::egress::{ALLOWED_SCHEMES, BLOCKED_HOSTS};
use crate::errors::ExecutionError;
use crate::services::logger::Logger;
use std::net::IpAddr;
use url::Url;

fn is_restricted(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_link_local() || v4.is_unspecified() || v4.is_private()
        }
        IpAddr::V6(v6) => {
            // v4-mapped addresses smuggle the v4 policy question into v6
            // syntax; answer it with the v4 rules.
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_restricted(IpAddr::V4(mapped));
            }
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || (v6.segments()[0] & 0xfe00) == 0xfc00
        }
    }
}

/// Outbound destination policy. Cloud metadata endpoints are always
/// rejected; private and loopback ranges are rejected unless the guard
/// was built with `allow_private`.
pub struct EgressGuard {
    logger: Logger,
    allow_private: bool,
}

impl EgressGuard {
    pub fn new(logger: Logger, allow_private: bool) -> Self {
        Self {
            logger,
            allow_private,
        }
    }

    pub fn from_env(logger: Logger) -> Self {
        let allow_private = std::env::var("TOOLGATE_ALLOW_PRIVATE_NETWORKS")
            .map(|raw| {
                matches!(
                    raw.trim().to_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
            .unwrap_or(false);
        Self::new(logger, allow_private)
    }

    pub async fn check(&self, url: &Url) -> Result<(), ExecutionError> {
        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(ExecutionError::rejected(format!(
                "Scheme '{}' is not permitted for outbound calls",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ExecutionError::rejected("Outbound URL has no host"))?;
        let normalized = host.trim_matches(|c| c == '[' || c == ']').to_lowercase();

        if BLOCKED_HOSTS.contains(&normalized.as_str()) {
            self.logger.warn(
                "Blocked egress to denied host",
                Some(&serde_json::json!({"host": host})),
            );
            return Err(ExecutionError::rejected(format!(
                "Egress to host '{}' is not permitted",
                host
            )));
        }

        if self.allow_private {
            return Ok(());
        }

        if let Ok(ip) = normalized.parse::<IpAddr>() {
            if is_restricted(ip) {
                return Err(ExecutionError::rejected(format!(
                    "Egress to host '{}' is not permitted",
                    host
                )));
            }
            return Ok(());
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let mut addrs = tokio::net::lookup_host((normalized.as_str(), port))
            .await
            .map_err(|_| {
                ExecutionError::rejected(format!("Host '{}' could not be resolved", host))
            })?;
        if addrs.any(|addr| is_restricted(addr.ip())) {
            return Err(ExecutionError::rejected(format!(
                "Host '{}' resolves to a restricted address",
                host
            )));
        }
        Ok(())
    }
}
