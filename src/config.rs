use crate::helpe::*;

/// The parameters of one multi-policy simulation run: workload mix,
/// address-space geometry, output naming, and the two tick constants
/// that define the prefill/steady-state boundary.
///
/// `total_time`/`prefill_time` default to the values the four policies
/// are compared under, but are plain fields rather than CLI flags so
/// that tests can drive a handful of ticks without touching the
/// tick-ordering semantics in [`crate::driver`].
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub small_pct:      i64,
    pub medium_pct:     i64,
    pub large_pct:      i64,
    pub unit_size:      Units,
    pub total_units:    Units,
    pub test_name:      String,
    pub summary_base:   String,
    pub log_base:       String,
    pub lost_mode:      bool,
    pub total_time:     Units,
    pub prefill_time:   Units,
}

impl SimConfig {
    pub fn new(
        small_pct:    i64,
        medium_pct:   i64,
        large_pct:    i64,
        unit_size:    Units,
        total_units:  Units,
        test_name:    String,
        summary_base: String,
        log_base:     String,
        lost_mode:    bool,
    ) -> Result<Self, SimError> {
        let sum = small_pct + medium_pct + large_pct;
        if sum != 100 {
            return Err(SimError::BadPercentages { small: small_pct, medium: medium_pct, large: large_pct, sum });
        }
        Ok(Self {
            small_pct,
            medium_pct,
            large_pct,
            unit_size,
            total_units,
            test_name,
            summary_base,
            log_base,
            lost_mode,
            total_time:   12000,
            prefill_time: 2000,
        })
    }

    pub fn summary_path(&self, policy: Policy) -> PathBuf {
        PathBuf::from(format!("{}_{}.txt", self.summary_base, policy.label()))
    }

    pub fn log_path(&self, policy: Policy) -> PathBuf {
        PathBuf::from(format!("{}_{}.txt", self.log_base, policy.label()))
    }
}
