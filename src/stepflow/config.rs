// SPDX-License-Identifier: MIT

//! Process configuration
//!
//! Read from the environment (after `.env` has been loaded by the binary).
//! Command-line flags override individual values.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::runtime::error::FlowError;
use crate::stepflow::workflow::graph::DEFAULT_MAX_STEPS;

pub const MAX_STEPS_VAR: &str = "STEPFLOW_MAX_STEPS";
pub const HOST_VAR: &str = "STEPFLOW_HOST";
pub const PORT_VAR: &str = "STEPFLOW_PORT";

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Step ceiling for every run
    pub max_steps: usize,
    pub host: IpAddr,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// Build the configuration from `STEPFLOW_*` environment variables
    pub fn from_env() -> Result<Self, FlowError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FlowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_steps = match lookup(MAX_STEPS_VAR) {
            Some(raw) => parse_max_steps(&raw)?,
            None => defaults.max_steps,
        };

        let host = match lookup(HOST_VAR) {
            Some(raw) => raw.trim().parse::<IpAddr>().map_err(|_| {
                FlowError::config(format!("{} must be an IP address, got '{}'", HOST_VAR, raw))
            })?,
            None => defaults.host,
        };

        let port = match lookup(PORT_VAR) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                FlowError::config(format!("{} must be a port number, got '{}'", PORT_VAR, raw))
            })?,
            None => defaults.port,
        };

        Ok(Self {
            max_steps,
            host,
            port,
        })
    }

    /// Override the step ceiling; zero is rejected
    pub fn with_max_steps(mut self, max_steps: usize) -> Result<Self, FlowError> {
        if max_steps == 0 {
            return Err(FlowError::config("max steps must be greater than zero"));
        }
        self.max_steps = max_steps;
        Ok(self)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_max_steps(raw: &str) -> Result<usize, FlowError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(FlowError::config(format!(
            "{} must be a positive integer, got '{}'",
            MAX_STEPS_VAR, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.max_steps, 1000);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8000");
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_reads_all_variables() {
        let config = AppConfig::from_lookup(lookup(&[
            (MAX_STEPS_VAR, "50"),
            (HOST_VAR, "0.0.0.0"),
            (PORT_VAR, " 9090 "),
        ]))
        .unwrap();
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:9090");
    }

    #[test]
    fn test_rejects_zero_or_garbage_max_steps() {
        for raw in ["0", "-1", "many", ""] {
            let err = AppConfig::from_lookup(lookup(&[(MAX_STEPS_VAR, raw)])).unwrap_err();
            assert!(matches!(err, FlowError::Config(_)), "accepted '{}'", raw);
        }
    }

    #[test]
    fn test_rejects_bad_host_and_port() {
        assert!(AppConfig::from_lookup(lookup(&[(HOST_VAR, "localhost:80")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(PORT_VAR, "70000")])).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::default()
            .with_max_steps(5)
            .unwrap()
            .with_port(3000);
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.port, 3000);
        assert!(AppConfig::default().with_max_steps(0).is_err());
    }
}
