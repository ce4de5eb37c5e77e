use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::model::{
    BreedPremium, BreedingStatus, Location, MappingRule, RuleConditions, Sex, Species,
};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: "https://statistics.mla.com.au".to_string(),
        }
    }
}

fn default_indicators() -> Vec<String> {
    ["EYCI", "WYCI", "ETLI", "NMI", "RGI"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_fetch_retries() -> usize {
    2
}

fn default_fetch_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Indicator codes fetched each batch cycle.
    #[serde(default = "default_indicators")]
    pub indicators: Vec<String>,
    #[serde(default = "AppConfig::default_rules")]
    pub rules: Vec<MappingRule>,
    #[serde(default = "AppConfig::default_premiums")]
    pub premiums: Vec<BreedPremium>,
    #[serde(default = "AppConfig::default_locations")]
    pub locations: Vec<Location>,
    /// State-level scaling applied to raw indicator values in the
    /// resolver's last fallback tier. Unlisted states use 1.0.
    #[serde(default)]
    pub regional_multipliers: HashMap<String, f64>,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: usize,
    #[serde(default = "default_fetch_retry_delay_ms")]
    pub fetch_retry_delay_ms: u64,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: ProviderConfig::default(),
            indicators: default_indicators(),
            rules: Self::default_rules(),
            premiums: Self::default_premiums(),
            locations: Self::default_locations(),
            regional_multipliers: HashMap::new(),
            ttl_hours: default_ttl_hours(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_retries: default_fetch_retries(),
            fetch_retry_delay_ms: default_fetch_retry_delay_ms(),
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("au", "saleyard", "saleyard")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("au", "saleyard", "saleyard")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Rejects values the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_hours == 0 {
            anyhow::bail!("ttl_hours must be at least 1; rows would expire at creation");
        }
        Ok(())
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours as i64)
    }

    /// Built-in rule set covering the common cattle, sheep and goat
    /// categories. Operators extend or replace these in config.yaml.
    pub fn default_rules() -> Vec<MappingRule> {
        vec![
            MappingRule {
                name: "Weaner Steer".to_string(),
                conditions: RuleConditions {
                    species: Some(Species::Cattle),
                    sex: Some(Sex::Male),
                    castrated: Some(true),
                    min_age_months: Some(6),
                    max_age_months: Some(12),
                    ..Default::default()
                },
                category: "Weaner Steer".to_string(),
                indicator: "EYCI".to_string(),
                priority: 10,
                active: true,
            },
            MappingRule {
                name: "Yearling Steer".to_string(),
                conditions: RuleConditions {
                    species: Some(Species::Cattle),
                    sex: Some(Sex::Male),
                    castrated: Some(true),
                    min_age_months: Some(12),
                    max_age_months: Some(24),
                    ..Default::default()
                },
                category: "Yearling Steer".to_string(),
                indicator: "EYCI".to_string(),
                priority: 20,
                active: true,
            },
            MappingRule {
                name: "Yearling Heifer".to_string(),
                conditions: RuleConditions {
                    species: Some(Species::Cattle),
                    sex: Some(Sex::Female),
                    min_age_months: Some(12),
                    max_age_months: Some(24),
                    breeding_status: Some(vec![BreedingStatus::NotBreeding]),
                    ..Default::default()
                },
                category: "Yearling Heifer".to_string(),
                indicator: "EYCI".to_string(),
                priority: 30,
                active: true,
            },
            MappingRule {
                name: "Grown Steer".to_string(),
                conditions: RuleConditions {
                    species: Some(Species::Cattle),
                    sex: Some(Sex::Male),
                    castrated: Some(true),
                    min_age_months: Some(24),
                    min_weight_kg: Some(500.0),
                    ..Default::default()
                },
                category: "Grown Steer".to_string(),
                indicator: "EYCI".to_string(),
                priority: 40,
                active: true,
            },
            MappingRule {
                name: "Breeding Cow".to_string(),
                conditions: RuleConditions {
                    species: Some(Species::Cattle),
                    sex: Some(Sex::Female),
                    breeding_status: Some(vec![
                        BreedingStatus::Joined,
                        BreedingStatus::Pregnant,
                        BreedingStatus::Lactating,
                    ]),
                    ..Default::default()
                },
                category: "Breeding Cow".to_string(),
                indicator: "EYCI".to_string(),
                priority: 50,
                active: true,
            },
            MappingRule {
                name: "Trade Lamb".to_string(),
                conditions: RuleConditions {
                    species: Some(Species::Sheep),
                    max_age_months: Some(12),
                    min_weight_kg: Some(18.0),
                    max_weight_kg: Some(26.0),
                    ..Default::default()
                },
                category: "Trade Lamb".to_string(),
                indicator: "ETLI".to_string(),
                priority: 110,
                active: true,
            },
            MappingRule {
                name: "Mutton".to_string(),
                conditions: RuleConditions {
                    species: Some(Species::Sheep),
                    min_age_months: Some(12),
                    ..Default::default()
                },
                category: "Mutton".to_string(),
                indicator: "NMI".to_string(),
                priority: 120,
                active: true,
            },
            MappingRule {
                name: "Rangeland Goat".to_string(),
                conditions: RuleConditions {
                    species: Some(Species::Goat),
                    ..Default::default()
                },
                category: "Rangeland Goat".to_string(),
                indicator: "RGI".to_string(),
                priority: 210,
                active: true,
            },
        ]
    }

    pub fn default_premiums() -> Vec<BreedPremium> {
        vec![
            BreedPremium {
                species: Species::Cattle,
                breed: "Angus".to_string(),
                category: "Yearling Steer".to_string(),
                premium_pct: 5.0,
                state: None,
                saleyard: None,
                confidence: 0.9,
                source: "saleyard_reports".to_string(),
                active: true,
            },
            BreedPremium {
                species: Species::Cattle,
                breed: "Angus".to_string(),
                category: "Weaner Steer".to_string(),
                premium_pct: 4.0,
                state: Some("NSW".to_string()),
                saleyard: None,
                confidence: 0.8,
                source: "saleyard_reports".to_string(),
                active: true,
            },
            BreedPremium {
                species: Species::Cattle,
                breed: "Wagyu".to_string(),
                category: "Yearling Steer".to_string(),
                premium_pct: 12.0,
                state: None,
                saleyard: None,
                confidence: 0.7,
                source: "operator".to_string(),
                active: true,
            },
            BreedPremium {
                species: Species::Cattle,
                breed: "Hereford".to_string(),
                category: "Yearling Steer".to_string(),
                premium_pct: 2.5,
                state: None,
                saleyard: None,
                confidence: 0.8,
                source: "saleyard_reports".to_string(),
                active: true,
            },
            BreedPremium {
                species: Species::Sheep,
                breed: "Poll Dorset".to_string(),
                category: "Trade Lamb".to_string(),
                premium_pct: 3.0,
                state: None,
                saleyard: None,
                confidence: 0.85,
                source: "saleyard_reports".to_string(),
                active: true,
            },
            BreedPremium {
                species: Species::Goat,
                breed: "Boer".to_string(),
                category: "Rangeland Goat".to_string(),
                premium_pct: 6.0,
                state: Some("QLD".to_string()),
                saleyard: None,
                confidence: 0.75,
                source: "operator".to_string(),
                active: true,
            },
        ]
    }

    pub fn default_locations() -> Vec<Location> {
        let saleyards = [
            ("NSW", "Wagga Wagga Livestock Marketing Centre"),
            ("NSW", "Dubbo Regional Livestock Market"),
            ("QLD", "Roma Saleyards"),
            ("VIC", "Ballarat Regional Livestock Exchange"),
            ("SA", "Mount Gambier Livestock Exchange"),
        ];
        let states = ["NSW", "VIC", "QLD", "SA", "WA"];

        let mut locations: Vec<Location> = saleyards
            .iter()
            .map(|(state, saleyard)| Location {
                state: Some(state.to_string()),
                saleyard: Some(saleyard.to_string()),
            })
            .collect();
        locations.extend(states.iter().map(|state| Location {
            state: Some(state.to_string()),
            saleyard: None,
        }));
        locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
provider:
  base_url: "http://example.com/mla"
indicators:
  - "EYCI"
  - "ETLI"
rules:
  - name: "Yearling Steer"
    conditions:
      species: cattle
      sex: male
      castrated: true
      min_age_months: 12
      max_age_months: 24
    category: "Yearling Steer"
    indicator: "EYCI"
    priority: 20
premiums:
  - species: cattle
    breed: "Angus"
    category: "Yearling Steer"
    premium_pct: 5.0
    state: ~
    saleyard: ~
locations:
  - state: "NSW"
    saleyard: "Wagga Wagga Livestock Marketing Centre"
  - state: "NSW"
    saleyard: ~
regional_multipliers:
  WA: 0.96
ttl_hours: 12
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "http://example.com/mla");
        assert_eq!(config.indicators, vec!["EYCI", "ETLI"]);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].category, "Yearling Steer");
        assert!(config.rules[0].active);
        assert_eq!(config.premiums.len(), 1);
        assert_eq!(config.premiums[0].confidence, 1.0);
        assert_eq!(config.premiums[0].source, "operator");
        assert_eq!(config.locations.len(), 2);
        assert_eq!(config.regional_multipliers.get("WA"), Some(&0.96));
        assert_eq!(config.ttl(), chrono::Duration::hours(12));
        assert_eq!(config.fetch_timeout_secs, 10);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "https://statistics.mla.com.au");
        assert!(!config.rules.is_empty());
        assert!(!config.premiums.is_empty());
        assert!(config.locations.iter().any(|l| l.saleyard.is_none()));
        assert_eq!(config.ttl_hours, 24);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config: AppConfig = serde_yaml::from_str("ttl_hours: 0").expect("Failed to deserialize");
        assert!(config.validate().is_err());

        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_rules_have_unique_priorities() {
        let rules = AppConfig::default_rules();
        let mut priorities: Vec<u32> = rules.iter().map(|r| r.priority).collect();
        priorities.sort_unstable();
        priorities.dedup();
        assert_eq!(priorities.len(), rules.len());
    }
}
