//! Problem parameters and solver configuration.
//!
//! [`ProblemParams`] describes the discretisation (`dx`, `dt`, number of steps);
//! [`SolverConfig`] carries the knobs shared by the serial and distributed
//! solvers. Both derive `serde` traits so callers can load them from any
//! serde-supported format.

use serde::{Deserialize, Serialize};

use crate::algs::communicator::{CollectiveTags, CommTag, HaloTags};
use crate::heat_error::HeatError;

/// Discretisation of one solve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemParams {
    /// Grid spacing.
    pub dx: f64,
    /// Time step. Expected to satisfy `dt <= 0.5 * dx^2`.
    pub dt: f64,
    /// Number of time steps to take.
    pub nt: usize,
}

impl ProblemParams {
    pub fn new(dx: f64, dt: f64, nt: usize) -> Self {
        Self { dx, dt, nt }
    }

    /// Parameters of the reference problem: `dx = 1/(n+1)`, `dt = 0.4 dx^2`.
    pub fn reference(n: usize, nt: usize) -> Self {
        let dx = 1.0 / (n as f64 + 1.0);
        Self::new(dx, 0.4 * dx * dx, nt)
    }

    /// Numerical diffusion coefficient `dt / dx^2`.
    ///
    /// Serial and distributed steppers both read it from here so they share
    /// one floating-point expression.
    #[inline]
    pub fn nu(&self) -> f64 {
        self.dt / (self.dx * self.dx)
    }

    /// Largest stable time step for this `dx`.
    pub fn stability_limit(&self) -> f64 {
        0.5 * self.dx * self.dx
    }

    pub fn is_stable(&self) -> bool {
        self.dt <= self.stability_limit()
    }

    /// Reject non-positive or non-finite spacings.
    pub fn validate(&self) -> Result<(), HeatError> {
        if !(self.dx.is_finite() && self.dx > 0.0) {
            return Err(HeatError::InvalidParams(format!(
                "dx must be positive and finite, got {}",
                self.dx
            )));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(HeatError::InvalidParams(format!(
                "dt must be positive and finite, got {}",
                self.dt
            )));
        }
        Ok(())
    }

    /// Validate, then apply `policy` to the stability precondition.
    pub fn check(&self, policy: StabilityPolicy) -> Result<(), HeatError> {
        self.validate()?;
        if policy == StabilityPolicy::Enforce && !self.is_stable() {
            return Err(HeatError::StabilityViolation {
                dt: self.dt,
                dx: self.dx,
                limit: self.stability_limit(),
            });
        }
        Ok(())
    }
}

/// Values imposed at the outer edges of the global domain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoundaryCondition {
    /// The two end points are pinned to this value after every step.
    Dirichlet(f64),
    /// The domain wraps around: point `N-1` neighbours point `0`.
    Periodic,
}

impl Default for BoundaryCondition {
    fn default() -> Self {
        BoundaryCondition::Dirichlet(0.0)
    }
}

impl BoundaryCondition {
    pub fn is_periodic(&self) -> bool {
        matches!(self, BoundaryCondition::Periodic)
    }

    /// Pinned value, if any.
    pub fn fixed_value(&self) -> Option<f64> {
        match *self {
            BoundaryCondition::Dirichlet(v) => Some(v),
            BoundaryCondition::Periodic => None,
        }
    }
}

/// What to do when `dt > 0.5 * dx^2`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StabilityPolicy {
    /// Fail with [`HeatError::StabilityViolation`] before stepping.
    #[default]
    Enforce,
    /// Trust the caller; unstable inputs produce diverging output.
    Trust,
}

/// Settings shared by the serial and distributed solvers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub boundary: BoundaryCondition,
    pub stability: StabilityPolicy,
    /// First message tag used by a distributed solve; a solve uses a small
    /// contiguous block of tags starting here.
    pub tag_base: u16,
    /// Receive timeout for in-process communicators, in milliseconds.
    pub comm_timeout_ms: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            boundary: BoundaryCondition::default(),
            stability: StabilityPolicy::default(),
            tag_base: 0x4800,
            comm_timeout_ms: 30_000,
        }
    }
}

impl SolverConfig {
    pub fn with_boundary(mut self, boundary: BoundaryCondition) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_stability(mut self, stability: StabilityPolicy) -> Self {
        self.stability = stability;
        self
    }

    pub fn with_tag_base(mut self, tag_base: u16) -> Self {
        self.tag_base = tag_base;
        self
    }

    pub fn with_comm_timeout_ms(mut self, ms: u64) -> Self {
        self.comm_timeout_ms = ms;
        self
    }

    pub fn comm_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.comm_timeout_ms)
    }

    /// Tags of the scatter/gather collectives: `tag_base .. tag_base + 4`.
    pub fn collective_tags(&self) -> CollectiveTags {
        CollectiveTags::from_base(CommTag::new(self.tag_base))
    }

    /// Tags of the halo exchange, right after the collective block.
    pub fn halo_tags(&self) -> HaloTags {
        HaloTags::from_base(CommTag::new(self.tag_base).offset(4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_params_are_stable() {
        let p = ProblemParams::reference(96, 100);
        assert_eq!(p.dx, 1.0 / 97.0);
        assert!(p.is_stable());
        assert!((p.nu() - 0.4).abs() < 1e-12);
        assert!(p.check(StabilityPolicy::Enforce).is_ok());
    }

    #[test]
    fn enforce_rejects_large_dt_trust_does_not() {
        let p = ProblemParams::new(0.1, 0.006, 10);
        assert!(matches!(
            p.check(StabilityPolicy::Enforce),
            Err(HeatError::StabilityViolation { .. })
        ));
        assert!(p.check(StabilityPolicy::Trust).is_ok());
    }

    #[test]
    fn validate_rejects_nonpositive_spacing() {
        assert!(ProblemParams::new(0.0, 1e-3, 1).validate().is_err());
        assert!(ProblemParams::new(0.1, -1e-3, 1).validate().is_err());
        assert!(ProblemParams::new(f64::NAN, 1e-3, 1).validate().is_err());
        // validation runs regardless of policy
        assert!(
            ProblemParams::new(0.1, f64::INFINITY, 1)
                .check(StabilityPolicy::Trust)
                .is_err()
        );
    }

    #[test]
    fn config_defaults_and_partial_json() {
        let cfg: SolverConfig =
            serde_json::from_str(r#"{ "boundary": "Periodic", "comm_timeout_ms": 250 }"#)
                .expect("config json");
        assert_eq!(cfg.boundary, BoundaryCondition::Periodic);
        assert_eq!(cfg.comm_timeout_ms, 250);
        assert_eq!(cfg.stability, StabilityPolicy::Enforce);
        assert_eq!(cfg.tag_base, SolverConfig::default().tag_base);
    }

    #[test]
    fn boundary_helpers() {
        assert_eq!(BoundaryCondition::default().fixed_value(), Some(0.0));
        assert!(BoundaryCondition::Periodic.is_periodic());
        assert_eq!(BoundaryCondition::Periodic.fixed_value(), None);
    }
}
