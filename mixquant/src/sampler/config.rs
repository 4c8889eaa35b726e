use crate::error::{QuantError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Master seed. Every task derives its own stream from it.
    pub seed: u64,
    /// Prior precision of each transcript mixture, added to component masses.
    pub prior_precision: f64,
    /// Components per work item.
    pub component_batch: usize,
    /// Multireads per work item.
    pub multiread_block: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            prior_precision: 0.1,
            component_batch: 10,
            multiread_block: 100,
        }
    }
}

impl SamplerConfig {
    pub fn new(seed: u64, prior_precision: f64) -> Self {
        Self {
            seed,
            prior_precision,
            ..Default::default()
        }
    }
    pub fn validate(&self) -> Result<()> {
        if !(self.prior_precision.is_finite() && 0f64 <= self.prior_precision) {
            let msg = format!("prior precision {} must be non-negative", self.prior_precision);
            return Err(QuantError::Config(msg));
        }
        if self.component_batch == 0 || self.multiread_block == 0 {
            return Err(QuantError::Config("batch sizes must be positive".to_string()));
        }
        Ok(())
    }
}
