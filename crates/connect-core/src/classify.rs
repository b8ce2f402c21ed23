//! Emergency number and built-in telephony classification
//!
//! Classification drives the emergency override in the candidate builder:
//! when the dialed handle is an emergency number, only accounts backed by
//! built-in telephony (PSTN) providers are eligible, everything else is
//! discarded.
//!
//! [`StaticCallClassifier`] is a configuration-driven implementation; the
//! defaults cover the well-known emergency short codes.
//!
//! # Usage Examples
//!
//! ```rust
//! use trunkline_connect_core::classify::{CallClassifier, EmergencyConfig, StaticCallClassifier};
//! use trunkline_connect_core::types::ProviderId;
//!
//! let mut config = EmergencyConfig::default();
//! config.pstn_providers.push(ProviderId::new("carrier.gsm"));
//!
//! let classifier = StaticCallClassifier::new(config);
//! assert!(classifier.is_emergency_number("911"));
//! assert!(classifier.is_builtin_telephony(&ProviderId::new("carrier.gsm")));
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::ProviderId;

/// Classifies dialed handles and provider components
pub trait CallClassifier: Send + Sync {
    /// Whether `dialed` should be treated as an emergency number
    fn is_emergency_number(&self, dialed: &str) -> bool;

    /// Whether `provider` is a built-in telephony (PSTN) component
    fn is_builtin_telephony(&self, provider: &ProviderId) -> bool;
}

/// Configuration for [`StaticCallClassifier`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyConfig {
    /// Dialed handles treated as emergency numbers
    pub emergency_numbers: Vec<String>,
    /// Provider components classified as built-in telephony
    pub pstn_providers: Vec<ProviderId>,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            emergency_numbers: vec!["911".to_string(), "112".to_string(), "999".to_string()],
            pstn_providers: Vec::new(),
        }
    }
}

/// Classifier backed by static configuration
pub struct StaticCallClassifier {
    emergency_numbers: HashSet<String>,
    pstn_providers: HashSet<ProviderId>,
}

impl StaticCallClassifier {
    /// Build a classifier from configuration
    pub fn new(config: EmergencyConfig) -> Self {
        Self {
            emergency_numbers: config.emergency_numbers.into_iter().collect(),
            pstn_providers: config.pstn_providers.into_iter().collect(),
        }
    }
}

impl CallClassifier for StaticCallClassifier {
    fn is_emergency_number(&self, dialed: &str) -> bool {
        self.emergency_numbers.contains(dialed)
    }

    fn is_builtin_telephony(&self, provider: &ProviderId) -> bool {
        self.pstn_providers.contains(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_emergency_numbers() {
        let classifier = StaticCallClassifier::new(EmergencyConfig::default());
        assert!(classifier.is_emergency_number("911"));
        assert!(classifier.is_emergency_number("112"));
        assert!(!classifier.is_emergency_number("5551234"));
    }

    #[test]
    fn pstn_classification_from_config() {
        let config = EmergencyConfig {
            emergency_numbers: vec!["911".to_string()],
            pstn_providers: vec![ProviderId::new("carrier.gsm")],
        };
        let classifier = StaticCallClassifier::new(config);
        assert!(classifier.is_builtin_telephony(&ProviderId::new("carrier.gsm")));
        assert!(!classifier.is_builtin_telephony(&ProviderId::new("voip.app")));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = EmergencyConfig {
            emergency_numbers: vec!["911".to_string()],
            pstn_providers: vec![ProviderId::new("carrier.gsm")],
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EmergencyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.emergency_numbers, config.emergency_numbers);
        assert_eq!(parsed.pstn_providers, config.pstn_providers);
    }
}
