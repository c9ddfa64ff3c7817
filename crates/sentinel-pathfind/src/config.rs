//! Configuration for the attack path engine.
//!
//! Loaded from the `sentinel.toml` `[pathfind]` section or
//! `SENTINEL_PATHFIND__` environment variables. Every weight used by the
//! difficulty derivation and the risk formula lives here.

use serde::Deserialize;

/// Top-level pathfind configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathfindConfig {
    #[serde(default)]
    pub enumeration: EnumerationConfig,
    #[serde(default)]
    pub difficulty: DifficultyConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub chokepoint: ChokepointConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Bounds for the per-pair branch-and-bound search.
#[derive(Debug, Clone, Deserialize)]
pub struct EnumerationConfig {
    /// Maximum edges in a path (default 8).
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    /// Paths retained per (entry point, crown jewel) pair (default 5).
    #[serde(default = "default_paths_per_pair")]
    pub paths_per_pair: usize,

    /// Search worker threads. `0` means one per available CPU.
    #[serde(default)]
    pub worker_threads: usize,

    /// Whole-computation time limit in seconds (default 300).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Constants for deriving `traversal_difficulty`.
///
/// `base = trust_cost(target) + auth/mfa surcharges (+ zone penalty)`,
/// scaled by the access/trust factors and any simulated control factor.
/// Enrichment then lowers it by `1 - exploit_reduction_cap * signal(target)`.
#[derive(Debug, Clone, Deserialize)]
pub struct DifficultyConfig {
    #[serde(default = "default_untrusted_cost")]
    pub untrusted_cost: f64,
    #[serde(default = "default_semi_trusted_cost")]
    pub semi_trusted_cost: f64,
    #[serde(default = "default_trusted_cost")]
    pub trusted_cost: f64,
    #[serde(default = "default_auth_surcharge")]
    pub auth_surcharge: f64,
    #[serde(default = "default_mfa_surcharge")]
    pub mfa_surcharge: f64,
    /// Multiplier for edges from `admin_access` lists.
    #[serde(default = "default_admin_access_factor")]
    pub admin_access_factor: f64,
    /// Multiplier for trust-relationship edges.
    #[serde(default = "default_trust_edge_factor")]
    pub trust_edge_factor: f64,
    /// Added to network edges whose endpoints sit in different zones.
    #[serde(default = "default_zone_crossing_penalty")]
    pub zone_crossing_penalty: f64,
    /// Largest fraction of difficulty removed by exploitability.
    #[serde(default = "default_exploit_reduction_cap")]
    pub exploit_reduction_cap: f64,
    /// Exploit signal assigned to any node with a known-exploited finding.
    #[serde(default = "default_kev_signal_floor")]
    pub kev_signal_floor: f64,
    /// Weight of normalized CVSS in the exploit signal.
    #[serde(default = "default_cvss_signal_weight")]
    pub cvss_signal_weight: f64,
    /// Control factor applied by a simulated EDR deployment.
    #[serde(default = "default_edr_factor")]
    pub edr_factor: f64,
    /// Control factor applied to network edges by a simulated firewall.
    #[serde(default = "default_firewall_factor")]
    pub firewall_factor: f64,
}

/// Weights for the 0–10 path scores.
///
/// ```text
/// exploitability = 10 × (w_kev × min(kev, sat)/sat + w_epss × avg_epss + w_unauth × unauth_ratio)
/// impact         = 10 × (w_crit × criticality + w_tier × impact_tier)
/// risk           = w_e × exploitability + w_i × impact + w_h × 10 × decay^(hops-1)
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_kev_weight")]
    pub kev_weight: f64,
    #[serde(default = "default_epss_weight")]
    pub epss_weight: f64,
    #[serde(default = "default_unauth_weight")]
    pub unauth_weight: f64,
    /// Known-exploited count at which the KEV term saturates.
    #[serde(default = "default_kev_saturation")]
    pub kev_saturation: usize,
    #[serde(default = "default_criticality_weight")]
    pub criticality_weight: f64,
    #[serde(default = "default_impact_tier_weight")]
    pub impact_tier_weight: f64,
    #[serde(default = "default_exploitability_share")]
    pub exploitability_share: f64,
    #[serde(default = "default_impact_share")]
    pub impact_share: f64,
    #[serde(default = "default_hop_share")]
    pub hop_share: f64,
    /// Per-hop decay of the path-length term (default 0.85).
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    /// Score ceiling (default 10.0).
    #[serde(default = "default_max_score")]
    pub max_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChokepointConfig {
    #[serde(default = "default_risk_share")]
    pub risk_share: f64,
    #[serde(default = "default_coverage_share")]
    pub coverage_share: f64,
    #[serde(default = "default_chokepoint_limit")]
    pub default_limit: usize,
}

/// Retention for the in-memory graph registry.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Simulation results kept per graph; the oldest are dropped first (default 50).
    #[serde(default = "default_max_simulation_history")]
    pub max_simulation_history: usize,
}

fn default_max_hops() -> usize {
    8
}

fn default_paths_per_pair() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_untrusted_cost() -> f64 {
    0.5
}

fn default_semi_trusted_cost() -> f64 {
    1.0
}

fn default_trusted_cost() -> f64 {
    2.0
}

fn default_auth_surcharge() -> f64 {
    1.0
}

fn default_mfa_surcharge() -> f64 {
    2.0
}

fn default_admin_access_factor() -> f64 {
    0.75
}

fn default_trust_edge_factor() -> f64 {
    0.8
}

fn default_zone_crossing_penalty() -> f64 {
    1.0
}

fn default_exploit_reduction_cap() -> f64 {
    0.8
}

fn default_kev_signal_floor() -> f64 {
    0.9
}

fn default_cvss_signal_weight() -> f64 {
    0.5
}

fn default_edr_factor() -> f64 {
    1.5
}

fn default_firewall_factor() -> f64 {
    3.0
}

fn default_kev_weight() -> f64 {
    0.4
}

fn default_epss_weight() -> f64 {
    0.3
}

fn default_unauth_weight() -> f64 {
    0.3
}

fn default_kev_saturation() -> usize {
    2
}

fn default_criticality_weight() -> f64 {
    0.7
}

fn default_impact_tier_weight() -> f64 {
    0.3
}

fn default_exploitability_share() -> f64 {
    0.35
}

fn default_impact_share() -> f64 {
    0.45
}

fn default_hop_share() -> f64 {
    0.2
}

fn default_decay_factor() -> f64 {
    0.85
}

fn default_max_score() -> f64 {
    10.0
}

fn default_risk_share() -> f64 {
    0.6
}

fn default_coverage_share() -> f64 {
    0.4
}

fn default_chokepoint_limit() -> usize {
    10
}

fn default_max_simulation_history() -> usize {
    50
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            paths_per_pair: default_paths_per_pair(),
            worker_threads: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            untrusted_cost: default_untrusted_cost(),
            semi_trusted_cost: default_semi_trusted_cost(),
            trusted_cost: default_trusted_cost(),
            auth_surcharge: default_auth_surcharge(),
            mfa_surcharge: default_mfa_surcharge(),
            admin_access_factor: default_admin_access_factor(),
            trust_edge_factor: default_trust_edge_factor(),
            zone_crossing_penalty: default_zone_crossing_penalty(),
            exploit_reduction_cap: default_exploit_reduction_cap(),
            kev_signal_floor: default_kev_signal_floor(),
            cvss_signal_weight: default_cvss_signal_weight(),
            edr_factor: default_edr_factor(),
            firewall_factor: default_firewall_factor(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            kev_weight: default_kev_weight(),
            epss_weight: default_epss_weight(),
            unauth_weight: default_unauth_weight(),
            kev_saturation: default_kev_saturation(),
            criticality_weight: default_criticality_weight(),
            impact_tier_weight: default_impact_tier_weight(),
            exploitability_share: default_exploitability_share(),
            impact_share: default_impact_share(),
            hop_share: default_hop_share(),
            decay_factor: default_decay_factor(),
            max_score: default_max_score(),
        }
    }
}

impl Default for ChokepointConfig {
    fn default() -> Self {
        Self {
            risk_share: default_risk_share(),
            coverage_share: default_coverage_share(),
            default_limit: default_chokepoint_limit(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_simulation_history: default_max_simulation_history(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PathfindConfig::default();
        assert_eq!(config.enumeration.max_hops, 8);
        assert_eq!(config.enumeration.paths_per_pair, 5);
        assert_eq!(config.enumeration.timeout_secs, 300);
        assert_eq!(config.chokepoint.default_limit, 10);
        assert_eq!(config.registry.max_simulation_history, 50);
    }

    #[test]
    fn test_score_shares_sum_to_one() {
        let s = ScoringConfig::default();
        let total = s.exploitability_share + s.impact_share + s.hop_share;
        assert!((total - 1.0).abs() < 1e-9);
        let e = s.kev_weight + s.epss_weight + s.unauth_weight;
        assert!((e - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: PathfindConfig =
            serde_json::from_str(r#"{"enumeration": {"max_hops": 4}}"#).unwrap();
        assert_eq!(config.enumeration.max_hops, 4);
        assert_eq!(config.enumeration.paths_per_pair, 5);
        assert!((config.difficulty.trusted_cost - 2.0).abs() < f64::EPSILON);
    }
}
