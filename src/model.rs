//! Core domain types shared across the engine

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Separator for encoded cache keys. Never appears in category, breed or
/// location names.
const KEY_SEP: char = '\u{1f}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Cattle,
    Sheep,
    Goat,
    Pig,
}

impl Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Species::Cattle => "Cattle",
                Species::Sheep => "Sheep",
                Species::Goat => "Goat",
                Species::Pig => "Pig",
            }
        )
    }
}

impl FromStr for Species {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cattle" => Ok(Species::Cattle),
            "sheep" => Ok(Species::Sheep),
            "goat" => Ok(Species::Goat),
            "pig" => Ok(Species::Pig),
            _ => Err(anyhow::anyhow!("Invalid species: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl FromStr for Sex {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            _ => Err(anyhow::anyhow!("Invalid sex: {}", s)),
        }
    }
}

/// Breeding state of an animal as reported by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreedingStatus {
    NotBreeding,
    Joined,
    Pregnant,
    Lactating,
}

impl FromStr for BreedingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_breeding" | "none" => Ok(BreedingStatus::NotBreeding),
            "joined" => Ok(BreedingStatus::Joined),
            "pregnant" => Ok(BreedingStatus::Pregnant),
            "lactating" => Ok(BreedingStatus::Lactating),
            _ => Err(anyhow::anyhow!("Invalid breeding status: {}", s)),
        }
    }
}

/// An animal description as supplied by the caller. Input only, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct LivestockDescriptor {
    pub species: Species,
    pub sex: Sex,
    pub castrated: bool,
    pub age_months: u32,
    pub weight_kg: f64,
    pub breeding_status: BreedingStatus,
    pub breed: Option<String>,
}

/// Structured, serializable predicate for a mapping rule. Every field is
/// optional; an undeclared condition does not constrain the descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConditions {
    pub species: Option<Species>,
    pub sex: Option<Sex>,
    pub castrated: Option<bool>,
    pub min_age_months: Option<u32>,
    pub max_age_months: Option<u32>,
    pub min_weight_kg: Option<f64>,
    pub max_weight_kg: Option<f64>,
    pub breeding_status: Option<Vec<BreedingStatus>>,
}

impl RuleConditions {
    /// True when every declared condition holds for the descriptor. Ranges
    /// are inclusive on both ends.
    pub fn matches(&self, d: &LivestockDescriptor) -> bool {
        if let Some(species) = self.species
            && species != d.species
        {
            return false;
        }
        if let Some(sex) = self.sex
            && sex != d.sex
        {
            return false;
        }
        if let Some(castrated) = self.castrated
            && castrated != d.castrated
        {
            return false;
        }
        if let Some(min) = self.min_age_months
            && d.age_months < min
        {
            return false;
        }
        if let Some(max) = self.max_age_months
            && d.age_months > max
        {
            return false;
        }
        if let Some(min) = self.min_weight_kg
            && d.weight_kg < min
        {
            return false;
        }
        if let Some(max) = self.max_weight_kg
            && d.weight_kg > max
        {
            return false;
        }
        if let Some(statuses) = &self.breeding_status
            && !statuses.contains(&d.breeding_status)
        {
            return false;
        }
        true
    }

    /// Checks that declared ranges are well formed.
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_age_months, self.max_age_months)
            && min > max
        {
            return Err(format!("age range {min}-{max} is inverted"));
        }
        if let (Some(min), Some(max)) = (self.min_weight_kg, self.max_weight_kg)
            && min > max
        {
            return Err(format!("weight range {min}-{max} is inverted"));
        }
        Ok(())
    }

    /// Human-readable weight range, stamped onto generated records.
    pub fn weight_label(&self) -> Option<String> {
        match (self.min_weight_kg, self.max_weight_kg) {
            (Some(min), Some(max)) => Some(format!("{min:.0}-{max:.0}kg")),
            (Some(min), None) => Some(format!("{min:.0}kg+")),
            (None, Some(max)) => Some(format!("up to {max:.0}kg")),
            (None, None) => None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Operator-managed rule translating raw animal attributes into a market
/// category. Lower priority wins among simultaneously matching rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    pub name: String,
    #[serde(default)]
    pub conditions: RuleConditions,
    pub category: String,
    /// Code of the market indicator this category is priced from.
    pub indicator: String,
    pub priority: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_confidence() -> f64 {
    1.0
}

fn default_source() -> String {
    "operator".to_string()
}

/// Percentage adjustment for a breed within a category, optionally scoped
/// to a state or a single saleyard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreedPremium {
    pub species: Species,
    pub breed: String,
    pub category: String,
    pub premium_pct: f64,
    pub state: Option<String>,
    pub saleyard: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A configured pricing location. Saleyard entries carry their state;
/// bare-state entries produce the state-level general rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub state: Option<String>,
    pub saleyard: Option<String>,
}

impl Location {
    /// Most specific label for this location, used in the cache key.
    pub fn key_label(&self) -> &str {
        self.saleyard
            .as_deref()
            .or(self.state.as_deref())
            .unwrap_or("national")
    }
}

/// Unique key of a cached price row: `(category, breed, location, as_of)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub category: String,
    pub breed: Option<String>,
    pub location: String,
    pub as_of: NaiveDate,
}

impl PriceKey {
    /// Case-normalized so prefix scans line up with the engine's
    /// case-insensitive matching.
    pub fn encode(&self) -> String {
        format!(
            "{}{KEY_SEP}{}{KEY_SEP}{}{KEY_SEP}{}",
            self.category.to_lowercase(),
            self.breed.as_deref().unwrap_or("-").to_lowercase(),
            self.location.to_lowercase(),
            self.as_of
        )
    }

    /// Prefix shared by every row of a category, for range scans.
    pub fn category_prefix(category: &str) -> String {
        format!("{}{KEY_SEP}", category.to_lowercase())
    }
}

/// A generated, cached price row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub category: String,
    pub species: Option<Species>,
    /// None means the general (no premium) row.
    pub breed: Option<String>,
    pub base_price: f64,
    pub final_price: f64,
    pub weight_label: Option<String>,
    pub state: Option<String>,
    pub saleyard: Option<String>,
    pub source: String,
    pub indicator: String,
    pub unit: String,
    pub as_of: NaiveDate,
    pub expires_at: DateTime<Utc>,
}

impl PriceRecord {
    pub fn key(&self) -> PriceKey {
        PriceKey {
            category: self.category.clone(),
            breed: self.breed.clone(),
            location: self
                .saleyard
                .as_deref()
                .or(self.state.as_deref())
                .unwrap_or("national")
                .to_string(),
            as_of: self.as_of,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Location specificity: saleyard rows beat state rows beat national.
    pub fn specificity(&self) -> u8 {
        if self.saleyard.is_some() {
            2
        } else if self.state.is_some() {
            1
        } else {
            0
        }
    }
}

/// Which fallback tier produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    /// Tier 1: exact category + breed + saleyard row.
    ExactMatch,
    /// Tier 2: general row at the requested saleyard.
    SaleyardGeneral,
    /// Tier 3: general row at state level.
    StateGeneral,
    /// Tier 4: raw indicator value with regional multiplier.
    IndicatorBaseline,
}

impl Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PriceSource::ExactMatch => "exact match",
                PriceSource::SaleyardGeneral => "saleyard general",
                PriceSource::StateGeneral => "state general",
                PriceSource::IndicatorBaseline => "indicator baseline",
            }
        )
    }
}

/// Best-available price returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub category: String,
    pub breed: Option<String>,
    pub price: f64,
    pub unit: String,
    pub state: Option<String>,
    pub saleyard: Option<String>,
    pub as_of: NaiveDate,
    pub source: PriceSource,
    /// True for tier 2-4 results: the requested breed/location was not
    /// matched exactly and no premium is applied.
    pub degraded: bool,
}
