//! This module implements some domain-specific 4-momentum handling logic.

use crate::numeric::{floats::consts::PI, Float};
use nalgebra::SVector;
use prefix_num_ops::real::*;

/// 4-momentum dimension
pub const MOMENTUM_DIM: usize = 4;

/// Relativistic 4-momentum
pub type Momentum = SVector<Float, MOMENTUM_DIM>;

/// Convenience const for accessing the X coordinate of a 4-vector
pub const X: usize = 0;

/// Convenience const for accessing the Y coordinate of a 4-vector
pub const Y: usize = 1;

/// Convenience const for accessing the Z coordinate of a 4-vector
pub const Z: usize = 2;

/// Convenience const for accessing the E coordinate of a 4-vector
pub const E: usize = 3;

/// Momentum component transverse to the beam axis
pub fn transverse_momentum(p: &Momentum) -> Float {
    p.fixed_rows::<2>(X).norm()
}

/// Azimuthal angle around the beam axis, in (-pi, pi]
pub fn azimuth(p: &Momentum) -> Float {
    p[Y].atan2(p[X])
}

/// Pseudorapidity of the spatial momentum direction
pub fn pseudorapidity(p: &Momentum) -> Float {
    let p_norm = p.fixed_rows::<3>(X).norm();
    0.5 * ln((p_norm + p[Z]) / (p_norm - p[Z]))
}

/// Invariant mass, clamped to zero for spacelike combinations
pub fn invariant_mass(p: &Momentum) -> Float {
    let mass_squared = p[E] * p[E] - p.fixed_rows::<3>(X).norm_squared();
    if mass_squared > 0. {
        sqrt(mass_squared)
    } else {
        0.
    }
}

/// Azimuthal separation of two momenta, wrapped into (-pi, pi]
pub fn delta_phi(p1: &Momentum, p2: &Momentum) -> Float {
    let mut dphi = azimuth(p1) - azimuth(p2);
    while dphi > PI {
        dphi -= 2. * PI;
    }
    while dphi <= -PI {
        dphi += 2. * PI;
    }
    dphi
}

/// Angular separation of two momenta in the (eta, phi) plane
pub fn delta_r(p1: &Momentum, p2: &Momentum) -> Float {
    let deta = pseudorapidity(p1) - pseudorapidity(p2);
    let dphi = delta_phi(p1, p2);
    sqrt(deta * deta + dphi * dphi)
}

/// Build a 4-momentum from collider kinematic variables
#[cfg(test)]
pub(crate) fn from_pt_eta_phi_m(pt: Float, eta: Float, phi: Float, mass: Float) -> Momentum {
    let px = pt * phi.cos();
    let py = pt * phi.sin();
    let pz = pt * eta.sinh();
    let energy = sqrt(px * px + py * py + pz * pz + mass * mass);
    Momentum::new(px, py, pz, energy)
}
