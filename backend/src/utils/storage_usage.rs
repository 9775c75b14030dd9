use serde::Serialize;

use crate::models::site_config::SiteConfig;

/// Ceiling the editor measures the serialized config against (a little under 5 MB of browser storage).
pub const STORAGE_LIMIT_BYTES: usize = 4_800_000;
pub const WARNING_PERCENT: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageLevel {
    Ok,
    Elevated,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub bytes: usize,
    pub limit: usize,
    pub percent: u8,
    pub level: UsageLevel,
    pub uploads_allowed: bool,
    pub near_limit: bool,
}

impl StorageUsage {
    pub fn from_bytes(bytes: usize, limit: usize) -> Self {
        let ratio = if limit == 0 { 1.0 } else { bytes as f64 / limit as f64 };
        let percent = (ratio * 100.0).round().min(100.0) as u8;
        let level = match percent {
            p if p > 90 => UsageLevel::Critical,
            p if p > 70 => UsageLevel::Elevated,
            _ => UsageLevel::Ok,
        };
        Self {
            bytes,
            limit,
            percent,
            level,
            uploads_allowed: percent < 100,
            near_limit: percent >= WARNING_PERCENT,
        }
    }

    pub fn of(config: &SiteConfig) -> Self {
        Self::from_bytes(config.serialized_len(), STORAGE_LIMIT_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_tiny() {
        let usage = StorageUsage::of(&SiteConfig::default());
        assert_eq!(usage.percent, 0);
        assert_eq!(usage.level, UsageLevel::Ok);
        assert!(usage.uploads_allowed);
        assert!(!usage.near_limit);
    }

    #[test]
    fn test_thresholds() {
        let at = |percent: usize| StorageUsage::from_bytes(STORAGE_LIMIT_BYTES * percent / 100, STORAGE_LIMIT_BYTES);

        assert_eq!(at(70).level, UsageLevel::Ok);
        assert_eq!(at(71).level, UsageLevel::Elevated);
        assert_eq!(at(91).level, UsageLevel::Critical);
        assert!(!at(94).near_limit);
        assert!(at(95).near_limit);
        assert!(at(99).uploads_allowed);
        assert!(!at(100).uploads_allowed);
    }

    #[test]
    fn test_percent_is_capped() {
        let usage = StorageUsage::from_bytes(STORAGE_LIMIT_BYTES * 3, STORAGE_LIMIT_BYTES);
        assert_eq!(usage.percent, 100);
        assert!(!usage.uploads_allowed);
    }

    #[test]
    fn test_rounds_to_nearest_percent() {
        // 99.52% rounds up and blocks uploads
        let usage = StorageUsage::from_bytes(4_777_000, STORAGE_LIMIT_BYTES);
        assert_eq!(usage.percent, 100);
        let usage = StorageUsage::from_bytes(4_775_000, STORAGE_LIMIT_BYTES);
        assert_eq!(usage.percent, 99);
    }
}
