//! # DFS Configuration
//!
//! Runtime configuration for a DFS context, including:
//!
//! - Regulatory domain (FCC / ETSI / unclassified)
//! - Platform variant (offload firmware vs direct-attach hardware)
//! - Sub-channel marking and NOL behavior
//! - Test hooks (radar injection, NOL bypass)
//!
//! Every hardware/regulatory variant is a runtime flag so a single binary
//! can be exercised against all combinations. Configuration is plain
//! serde-derived data and can be loaded from YAML:
//!
//! ```yaml
//! domain: etsi
//! offload: false
//! subchannel_marking: true
//! nol_timeout_ms: 1800000
//! cac_valid_ms: 60000
//! ```

use serde::{Deserialize, Serialize};

/// Default NOL quarantine duration: 30 minutes.
pub const DEFAULT_NOL_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Lifetime of an ETSI pre-CAC "done" entry: 24 hours.
pub const ETSI_PRECAC_DONE_LIFETIME_MS: u64 = 86_400_000;

/// ETSI weather-radar band (inclusive bounds, MHz). Channels in this band
/// carry a longer CAC and may carry a domain-specific NOL timeout.
pub const ETSI_WEATHER_BAND_MHZ: (u16, u16) = (5600, 5650);

/// Regulatory domain. Only ETSI maintains the long-lived pre-CAC "done"
/// list and the weather-radar exception band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegDomain {
    /// FCC rules.
    Fcc,
    /// ETSI rules (pre-CAC list, weather band).
    Etsi,
    /// Any other or not-yet-known domain.
    Unclassified,
}

impl Default for RegDomain {
    fn default() -> Self {
        RegDomain::Fcc
    }
}

/// Runtime configuration for one DFS context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DfsConfig {
    /// Regulatory domain.
    pub domain: RegDomain,
    /// True when radar processing runs in offload firmware; false for
    /// direct-attach hardware that needs explicit detector disables
    /// around a channel change.
    pub offload: bool,
    /// Mark only the radar-affected 20 MHz sub-channels instead of the
    /// whole bonded channel, and emit the RCSA NOL information element.
    pub subchannel_marking: bool,
    /// Disable NOL bookkeeping entirely (radar-injection bring-up mode:
    /// the radio CSAs back onto the current channel).
    pub disable_nol: bool,
    /// Ignore DFS entirely (regulatory testing only).
    pub ignore_dfs: bool,
    /// Skip CAC before using DFS channels (regulatory testing only).
    pub ignore_cac: bool,
    /// NOL quarantine duration in milliseconds.
    pub nol_timeout_ms: u64,
    /// NOL duration for ETSI weather-band channels; `None` uses
    /// `nol_timeout_ms`.
    pub weather_nol_timeout_ms: Option<u64>,
    /// Grace period after a clean CAC during which re-CAC is suppressed;
    /// 0 disables the grace timer.
    pub cac_valid_ms: u64,
    /// The operating configuration is the 165 MHz-restricted 80+80 hybrid
    /// with unequal segment centers.
    pub restricted_80p80: bool,
    /// Legacy (non-agile) chips run pre-CAC on the secondary segment of
    /// the operating channel.
    pub legacy_precac: bool,
}

impl Default for DfsConfig {
    fn default() -> Self {
        Self {
            domain: RegDomain::Fcc,
            offload: true,
            subchannel_marking: true,
            disable_nol: false,
            ignore_dfs: false,
            ignore_cac: false,
            nol_timeout_ms: DEFAULT_NOL_TIMEOUT_MS,
            weather_nol_timeout_ms: None,
            cac_valid_ms: 0,
            restricted_80p80: false,
            legacy_precac: false,
        }
    }
}

impl DfsConfig {
    /// Parses a configuration from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// NOL timeout for a particular channel frequency, honoring the ETSI
    /// weather-band override when one is configured.
    pub fn nol_timeout_for(&self, freq_mhz: u16) -> u64 {
        if self.domain == RegDomain::Etsi
            && freq_mhz >= ETSI_WEATHER_BAND_MHZ.0
            && freq_mhz <= ETSI_WEATHER_BAND_MHZ.1
        {
            if let Some(t) = self.weather_nol_timeout_ms {
                return t;
            }
        }
        self.nol_timeout_ms
    }

    /// True when the domain keeps the long-lived ETSI pre-CAC done list.
    pub fn etsi_precac(&self) -> bool {
        self.domain == RegDomain::Etsi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = DfsConfig::default();
        assert_eq!(cfg.domain, RegDomain::Fcc);
        assert!(cfg.offload);
        assert!(cfg.subchannel_marking);
        assert_eq!(cfg.nol_timeout_ms, 1_800_000);
        assert_eq!(cfg.cac_valid_ms, 0);
        assert!(!cfg.etsi_precac());
    }

    #[test]
    fn test_from_yaml() {
        let cfg = DfsConfig::from_yaml(
            "domain: etsi\noffload: false\nnol_timeout_ms: 60000\n",
        )
        .unwrap();
        assert_eq!(cfg.domain, RegDomain::Etsi);
        assert!(!cfg.offload);
        assert_eq!(cfg.nol_timeout_ms, 60_000);
        // Unspecified fields fall back to defaults
        assert!(cfg.subchannel_marking);
    }

    #[test]
    fn test_weather_band_timeout() {
        let mut cfg = DfsConfig {
            domain: RegDomain::Etsi,
            weather_nol_timeout_ms: Some(3_600_000),
            ..DfsConfig::default()
        };
        assert_eq!(cfg.nol_timeout_for(5600), 3_600_000);
        assert_eq!(cfg.nol_timeout_for(5650), 3_600_000);
        assert_eq!(cfg.nol_timeout_for(5500), DEFAULT_NOL_TIMEOUT_MS);
        // FCC ignores the weather override
        cfg.domain = RegDomain::Fcc;
        assert_eq!(cfg.nol_timeout_for(5600), DEFAULT_NOL_TIMEOUT_MS);
    }
}
