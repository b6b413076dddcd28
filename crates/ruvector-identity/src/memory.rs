//! Memory accounting for bit-packed encoder state
//!
//! Every hypervector is counted at its packed size, `ceil(hv_dim / 8)`
//! bytes, which is exactly what the model file and the embedded target
//! store. Totals are kept as integer bytes so `total == basis + levels +
//! prototypes` holds exactly; the KB views divide by 1024, a power of two,
//! which keeps that equality exact in `f64` too.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Footprint of an encoder's basis, levels and prototypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryReport {
    /// Hypervector width in bits
    pub hv_dim: usize,
    /// Packed bytes per hypervector
    pub bytes_per_vector: usize,
    /// Number of basis vectors
    pub basis_vectors: usize,
    /// Number of level vectors
    pub level_vectors: usize,
    /// Number of class prototypes
    pub num_classes: usize,
    /// Packed bytes of all basis vectors
    pub basis_bytes: usize,
    /// Packed bytes of all level vectors
    pub level_bytes: usize,
    /// Packed bytes of all prototypes
    pub prototype_bytes: usize,
    /// Sum of the three parts
    pub total_bytes: usize,
}

impl MemoryReport {
    /// Computes the report for an encoder shape
    pub fn for_shape(hv_dim: usize, input_dim: usize, levels: usize, num_classes: usize) -> Self {
        let bytes_per_vector = hv_dim.div_ceil(8);
        let basis_bytes = input_dim * bytes_per_vector;
        let level_bytes = levels * bytes_per_vector;
        let prototype_bytes = num_classes * bytes_per_vector;

        Self {
            hv_dim,
            bytes_per_vector,
            basis_vectors: input_dim,
            level_vectors: levels,
            num_classes,
            basis_bytes,
            level_bytes,
            prototype_bytes,
            total_bytes: basis_bytes + level_bytes + prototype_bytes,
        }
    }

    /// Bits held by basis vectors
    pub fn basis_bits(&self) -> usize {
        self.basis_vectors * self.hv_dim
    }

    /// Bits held by level vectors
    pub fn level_bits(&self) -> usize {
        self.level_vectors * self.hv_dim
    }

    /// Bits held by prototypes
    pub fn prototype_bits(&self) -> usize {
        self.num_classes * self.hv_dim
    }

    pub fn basis_kb(&self) -> f64 {
        self.basis_bytes as f64 / 1024.0
    }

    pub fn levels_kb(&self) -> f64 {
        self.level_bytes as f64 / 1024.0
    }

    pub fn prototypes_kb(&self) -> f64 {
        self.prototype_bytes as f64 / 1024.0
    }

    pub fn total_kb(&self) -> f64 {
        self.total_bytes as f64 / 1024.0
    }

    /// Checks the footprint against an embedded target
    pub fn check(&self, budget: &EmbeddedBudget) -> FootprintCheck {
        let flash_kb = self.total_kb();
        let sram_kb = flash_kb + budget.runtime_overhead_kb;

        FootprintCheck {
            flash_kb,
            sram_kb,
            fits_flash: flash_kb < budget.flash_kb,
            fits_sram: sram_kb < budget.sram_kb,
        }
    }

    /// True when the model fits both flash and SRAM of `budget`
    pub fn fits(&self, budget: &EmbeddedBudget) -> bool {
        self.check(budget).fits()
    }
}

impl fmt::Display for MemoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "basis:      {:>10.2} KB ({} vectors)", self.basis_kb(), self.basis_vectors)?;
        writeln!(f, "levels:     {:>10.2} KB ({} vectors)", self.levels_kb(), self.level_vectors)?;
        writeln!(f, "prototypes: {:>10.2} KB ({} classes)", self.prototypes_kb(), self.num_classes)?;
        write!(f, "total:      {:>10.2} KB", self.total_kb())
    }
}

/// Storage limits of an embedded deployment target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedBudget {
    /// Flash available for the model, KB
    pub flash_kb: f64,
    /// SRAM available at runtime, KB
    pub sram_kb: f64,
    /// Working memory needed on top of the model at runtime, KB
    pub runtime_overhead_kb: f64,
}

impl Default for EmbeddedBudget {
    /// 512 KB flash, 128 KB SRAM, 20 KB runtime overhead
    fn default() -> Self {
        Self {
            flash_kb: 512.0,
            sram_kb: 128.0,
            runtime_overhead_kb: 20.0,
        }
    }
}

/// Result of [`MemoryReport::check`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootprintCheck {
    /// Model size in flash, KB
    pub flash_kb: f64,
    /// Model plus runtime overhead in SRAM, KB
    pub sram_kb: f64,
    pub fits_flash: bool,
    pub fits_sram: bool,
}

impl FootprintCheck {
    pub fn fits(&self) -> bool {
        self.fits_flash && self.fits_sram
    }
}
