//! # Config
//!
//! Process-wide knobs, exposed as an explicit [`Settings`] object so tests
//! and embedders can inject values without touching the environment. The
//! default constructor falls back to the ambient environment variables.

use std::env;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable holding the IPv4 dotted quad to advertise in
/// `PORT` commands instead of the auto-detected local address.
pub const ACTIVE_DT_HOST_ADDRESS: &str = "ACTIVE_DT_HOST_ADDRESS";

/// Environment variable holding the keep-alive NOOP delay in milliseconds.
/// Zero (the default) disables the keep-alive ticker.
pub const DT_AUTO_NOOP_DELAY: &str = "DT_AUTO_NOOP_DELAY";

/// Tunables of a client session.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address to advertise in `PORT` commands. `None` auto-detects the
    /// local address of the outbound interface.
    pub active_host_override: Option<Ipv4Addr>,
    /// Delay between keep-alive NOOPs during a transfer; zero disables
    /// the ticker.
    pub keep_alive_delay: Duration,
    /// How long the active-mode listener waits for the server to connect.
    pub accept_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_host_override: None,
            keep_alive_delay: Duration::ZERO,
            accept_timeout: Duration::from_secs(60),
        }
    }
}

impl Settings {
    /// Builds the settings from the process environment, falling back to
    /// defaults for anything unset or invalid.
    pub fn from_env() -> Self {
        Self::from_values(
            env::var(ACTIVE_DT_HOST_ADDRESS).ok().as_deref(),
            env::var(DT_AUTO_NOOP_DELAY).ok().as_deref(),
        )
    }

    fn from_values(host_address: Option<&str>, noop_delay: Option<&str>) -> Self {
        Self {
            active_host_override: host_address.and_then(parse_host_override),
            keep_alive_delay: noop_delay.map(parse_noop_delay).unwrap_or(Duration::ZERO),
            ..Self::default()
        }
    }
}

/// Validates the forced active-mode address: four dotted octets in 0..=255.
/// Invalid values are ignored with a warning.
fn parse_host_override(value: &str) -> Option<Ipv4Addr> {
    match Ipv4Addr::from_str(value) {
        Ok(addr) => Some(addr),
        Err(_) => {
            warn!(
                "invalid value {:?} for the {} setting; expected a dotted quad in the x.x.x.x form",
                value, ACTIVE_DT_HOST_ADDRESS
            );
            None
        }
    }
}

fn parse_noop_delay(value: &str) -> Duration {
    match value.parse::<u64>() {
        Ok(millis) => Duration::from_millis(millis),
        Err(_) => {
            warn!(
                "invalid value {:?} for the {} setting; keep-alive disabled",
                value, DT_AUTO_NOOP_DELAY
            );
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.active_host_override, None);
        assert_eq!(settings.keep_alive_delay, Duration::ZERO);
        assert_eq!(settings.accept_timeout, Duration::from_secs(60));
    }

    #[test]
    fn should_parse_valid_values() {
        let settings = Settings::from_values(Some("10.0.0.4"), Some("15000"));
        assert_eq!(
            settings.active_host_override,
            Some(Ipv4Addr::new(10, 0, 0, 4))
        );
        assert_eq!(settings.keep_alive_delay, Duration::from_millis(15000));
    }

    #[test]
    fn should_ignore_invalid_host_override() {
        crate::log_init();
        assert_eq!(
            Settings::from_values(Some("999.0.0.1"), None).active_host_override,
            None
        );
        assert_eq!(
            Settings::from_values(Some("not-an-address"), None).active_host_override,
            None
        );
        assert_eq!(
            Settings::from_values(Some("10.0.0"), None).active_host_override,
            None
        );
    }

    #[test]
    fn should_disable_keep_alive_on_invalid_delay() {
        crate::log_init();
        assert_eq!(
            Settings::from_values(None, Some("soon")).keep_alive_delay,
            Duration::ZERO
        );
        assert_eq!(
            Settings::from_values(None, None).keep_alive_delay,
            Duration::ZERO
        );
    }
}
