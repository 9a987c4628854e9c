/// Symmetry point of the pedestal.
pub(super) const PEDESTAL_CENTER: f64 = 0.975;
/// Half of the pedestal width.
pub(super) const PEDESTAL_HALF_WIDTH: f64 = 0.04;
/// Flux at which the default profile reaches zero.
pub(super) const PEDESTAL_FOOT: f64 = 1.2;

fn shape(psi: f64) -> f64 {
    0.5 * (2.0 * (PEDESTAL_CENTER - psi) / PEDESTAL_HALF_WIDTH).tanh() + 2.0 * (-2.0 * psi).exp()
}

/// tanh pedestal plus exponential core, normalized so that the value at the
/// pedestal top equals `top` and the value at the foot is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct PedestalProfile {
    amplitude: f64,
}

impl PedestalProfile {
    pub(super) fn new(top: f64) -> Self {
        let amplitude = top / (shape(PEDESTAL_CENTER - PEDESTAL_HALF_WIDTH) - shape(PEDESTAL_FOOT));
        Self { amplitude }
    }

    /// Closed form for any psi; negative beyond the foot.
    pub(super) fn value(&self, psi: f64) -> f64 {
        self.amplitude * (shape(psi) - shape(PEDESTAL_FOOT))
    }

    pub(super) fn derivative(&self, psi: f64) -> f64 {
        let tanh = (2.0 * (PEDESTAL_CENTER - psi) / PEDESTAL_HALF_WIDTH).tanh();
        -self.amplitude / PEDESTAL_HALF_WIDTH * (1.0 - tanh * tanh)
            - 4.0 * self.amplitude * (-2.0 * psi).exp()
    }
}
