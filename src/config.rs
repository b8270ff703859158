use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

use crate::domain::BatterySpec;
use crate::forecast::SyntheticForecastConfig;
use crate::optimizer::DispatchSettings;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "VPP__";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    pub optimizer: DispatchSettings,
    pub fleet: FleetConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Periodic re-dispatch interval; 0 disables the loop.
    pub reoptimize_every_minutes: u64,
}

/// Batteries registered at startup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub batteries: Vec<BatterySpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Seed the in-memory store with generated data when set.
    pub synthetic: Option<SyntheticForecastConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_path(DEFAULT_CONFIG_PATH)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        let cfg: Self = figment.extract()?;
        cfg.optimizer.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EfficiencyModel;
    use crate::optimizer::BigM;
    use figment::Jail;

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let cfg = Config::from_path("does-not-exist.toml").map_err(|e| e.to_string())?;
            assert_eq!(cfg.server.port, 8080);
            assert!(cfg.fleet.batteries.is_empty());
            assert!(cfg.forecast.synthetic.is_none());
            assert_eq!(cfg.optimizer, DispatchSettings::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_are_merged() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "vpp.toml",
                r#"
                [server]
                port = 9000

                [optimizer]
                efficiency_model = "split"
                big_m = { mode = "fixed", value = 250.0 }

                [[fleet.batteries]]
                capacity_kwh = 13.5
                current_soc_kwh = 4.0
                max_charge_kw = 5.0
                max_discharge_kw = 5.0
                round_trip_efficiency = 0.9

                [forecast.synthetic]
                hours = 48
                "#,
            )?;
            jail.set_env("VPP__SERVER__HOST", "127.0.0.1");
            jail.set_env("VPP__CONTROLLER__REOPTIMIZE_EVERY_MINUTES", "15");

            let cfg = Config::from_path("vpp.toml").map_err(|e| e.to_string())?;
            assert_eq!(cfg.server.port, 9000);
            assert_eq!(cfg.server.host, "127.0.0.1");
            assert_eq!(cfg.controller.reoptimize_every_minutes, 15);
            assert_eq!(cfg.optimizer.efficiency_model, EfficiencyModel::Split);
            assert_eq!(cfg.optimizer.big_m, BigM::Fixed { value: 250.0 });
            assert_eq!(cfg.fleet.batteries.len(), 1);
            assert_eq!(cfg.fleet.batteries[0].capacity_kwh, 13.5);

            let synthetic = cfg.forecast.synthetic.expect("synthetic section");
            assert_eq!(synthetic.hours, 48);
            assert_eq!(synthetic.solar_sources, 1);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_big_m_is_rejected_at_load() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "vpp.toml",
                r#"
                [optimizer]
                big_m = { mode = "fixed", value = 0.0 }
                "#,
            )?;
            let err = Config::from_path("vpp.toml").unwrap_err();
            assert!(err.to_string().contains("big_m value"));

            jail.set_env("VPP__OPTIMIZER__BIG_M__VALUE", "500");
            let cfg = Config::from_path("vpp.toml").map_err(|e| e.to_string())?;
            assert_eq!(cfg.optimizer.big_m, BigM::Fixed { value: 500.0 });
            Ok(())
        });
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".into(),
            port: 3000,
            ..Default::default()
        };
        assert_eq!(server.socket_addr().unwrap().port(), 3000);
    }
}
