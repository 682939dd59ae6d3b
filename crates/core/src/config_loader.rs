use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";
const ENV_PREFIX: &str = "QUANTGATE_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering built-in defaults, TOML, JSON and environment variables.
    ///
    /// Nested keys are addressed in the environment with a double underscore,
    /// e.g. `QUANTGATE_INSTRUMENTS__CACHE_TTL_SECS=600`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Same as [`ConfigLoader::load`] with an explicit TOML path.
    ///
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let config: AppConfig = Self::base()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file("config/Config.json"))
            .extract()?;

        Ok(config)
    }

    /// Loads application configuration with a specific profile.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        let config: AppConfig = Self::base()
            .merge(Toml::file(DEFAULT_CONFIG_PATH))
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file("config/Config.json"))
            .extract()?;

        Ok(config)
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_without_files() {
        figment::Jail::expect_with(|_jail| {
            let config = ConfigLoader::load().expect("defaults load");
            assert_eq!(config, AppConfig::default());
            assert_eq!(config.instruments.cache_ttl_secs, 1800);
            assert!(config.validator.enforce_min);
            Ok(())
        });
    }

    #[test]
    fn test_toml_and_env_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/Config.toml",
                r#"
                [instruments]
                cache_ttl_secs = 600
                extra_suffixes = [".X"]

                [instruments.overrides.BTCUSDT]
                qty_step = "0.01"
                min_notional = "10"

                [validator]
                enforce_min = false
                "#,
            )?;
            jail.set_env("QUANTGATE_INSTRUMENTS__FETCH_TIMEOUT_MS", "250");

            let config = ConfigLoader::load().expect("layered load");
            assert_eq!(config.instruments.cache_ttl_secs, 600);
            assert_eq!(config.instruments.fetch_timeout_ms, 250);
            assert_eq!(config.instruments.extra_suffixes, vec![".X".to_string()]);
            assert!(!config.validator.enforce_min);

            let btc = &config.instruments.overrides["BTCUSDT"];
            assert_eq!(btc.qty_step, Some(dec!(0.01)));
            assert_eq!(btc.min_notional, Some(dec!(10)));
            assert_eq!(btc.tick_size, None);
            Ok(())
        });
    }

    #[test]
    fn test_profile_overrides_base() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file("config/Config.toml", "[ledger]\nhistory_limit = 50\n")?;
            jail.create_file("config/Config.paper.toml", "[ledger]\nhistory_limit = 5\n")?;

            let config = ConfigLoader::load_with_profile("paper").expect("profile load");
            assert_eq!(config.ledger.history_limit, 5);
            assert!(config.ledger.reject_off_grid_fills);
            Ok(())
        });
    }
}
