//! Empirical flux-layer (Eich) deposition profile.

use super::mapping::MidplaneMap;
use crate::common::constants::{MM_TO_M, PEAK_SEARCH_SAMPLES};
use crate::domain::{Heat3dError, Heat3dResult};
use crate::numerics::{argmax, exp_erfc, linear_grid, max_finite};

/// Eich profile at midplane position `s` (m) for a separatrix at `s0` (m).
///
/// `lq` and `spread` are in mm; no flux expansion and no background.
pub fn eich_profile(s: f64, s0: f64, q0: f64, lq: f64, spread: f64) -> f64 {
    let a = lq * MM_TO_M;
    let b = 0.5 * spread / lq;
    let c = spread * MM_TO_M;
    let ds = s - s0;
    0.5 * q0 * exp_erfc(b * b - ds / a, b - ds / c)
}

/// Where the profile peak is placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum LayerAnchor {
    /// Peak at `lcfs`; everything inside is held at the peak value.
    Lobes { lcfs: f64 },
    /// Peak at the separatrix; used for the private flux region.
    Separatrix,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct LayerProfile {
    pub q: Vec<f64>,
    /// Value at psiN = 1 in the same normalization as `q`.
    pub q_separatrix: f64,
}

/// Profile over `psi`, normalized so its maximum equals `amplitude`.
pub(super) fn set_layer(
    map: &MidplaneMap,
    psi: &[f64],
    lq: f64,
    spread: f64,
    anchor: LayerAnchor,
    amplitude: f64,
) -> Heat3dResult<LayerProfile> {
    let (psi_anchor, window) = match anchor {
        LayerAnchor::Lobes { lcfs } => (lcfs, (lcfs - 0.05, lcfs + 0.1)),
        LayerAnchor::Separatrix => (1.0, (0.95, 1.1)),
    };
    let s0 = map.radius(psi_anchor);
    let search = linear_grid(window.0, window.1, PEAK_SEARCH_SAMPLES).ok_or_else(|| {
        Heat3dError::internal("SYS.PEAK_GRID", "peak search grid could not be built")
    })?;
    let search_r = map.radii(&search);
    let reference: Vec<f64> = search_r
        .iter()
        .map(|&s| eich_profile(s, s0, 1.0, lq, spread))
        .collect();
    let peak = argmax(&reference).ok_or_else(|| {
        Heat3dError::computation(
            "COMPUTE.LAYER_PEAK",
            format!("reference layer profile has no finite value (lq={}, S={})", lq, spread),
        )
    })?;
    let mut s_max = search_r[peak];
    let q_max = reference[peak];

    let mut x = map.radii(psi);
    let mut x_separatrix = map.radius(1.0);
    // High-field side: R decreases outward, so work in -R.
    let x0 = if map.side().is_high_field() {
        x.iter_mut().for_each(|value| *value = -*value);
        s_max = -s_max;
        x_separatrix = -x_separatrix;
        s_max
    } else {
        s0 - (s_max - s0)
    };

    let mut q: Vec<f64> = x
        .iter()
        .map(|&s| eich_profile(s, x0, 1.0, lq, spread))
        .collect();
    let q_separatrix = eich_profile(x_separatrix, x0, 1.0, lq, spread);
    if let LayerAnchor::Lobes { lcfs } = anchor {
        for (value, &psi) in q.iter_mut().zip(psi) {
            if psi < lcfs {
                *value = q_max;
            }
        }
    }

    let norm = max_finite(&q)
        .filter(|norm| norm.is_finite() && *norm > 0.0)
        .ok_or_else(|| {
            Heat3dError::computation(
                "COMPUTE.LAYER_NORM",
                "layer profile has no positive maximum to normalize by",
            )
        })?;
    q.iter_mut().for_each(|value| *value = *value / norm * amplitude);
    Ok(LayerProfile {
        q,
        q_separatrix: q_separatrix / norm * amplitude,
    })
}

/// Peak-normalized layer shape: the main branch with lobes, PFR points
/// re-evaluated about the separatrix and capped at the main branch's
/// separatrix value.
pub(super) fn layer_shape(
    map: &MidplaneMap,
    psi: &[f64],
    pfr: &[bool],
    lq: f64,
    spread: f64,
    lcfs: f64,
) -> Heat3dResult<Vec<f64>> {
    let main = set_layer(map, psi, lq, spread, LayerAnchor::Lobes { lcfs }, 1.0)?;
    let mut q = main.q;
    let pfr_psi: Vec<f64> = psi
        .iter()
        .zip(pfr)
        .filter(|(_, in_pfr)| **in_pfr)
        .map(|(&psi, _)| psi)
        .collect();
    if pfr_psi.is_empty() {
        return Ok(q);
    }

    let private = set_layer(
        map,
        &pfr_psi,
        lq,
        spread,
        LayerAnchor::Separatrix,
        main.q_separatrix,
    )?;
    let targets = q.iter_mut().zip(pfr).filter(|(_, in_pfr)| **in_pfr);
    for ((value, _), private_value) in targets.zip(private.q) {
        *value = private_value;
    }
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::{eich_profile, layer_shape, set_layer, LayerAnchor};
    use crate::domain::DivertorSide;
    use crate::modules::heatflux::mapping::MidplaneMap;
    use crate::modules::heatflux::tests::CircularEquilibrium;
    use crate::numerics::{argmax, erfc, linear_grid};

    #[test]
    fn eich_profile_matches_closed_form() {
        let (lq, spread, s0): (f64, f64, f64) = (5.0, 2.0, 2.2);
        for s in [2.19, 2.2, 2.203, 2.25] {
            let a = lq * 1.0e-3;
            let b = 0.5 * spread / lq;
            let c = spread * 1.0e-3;
            let expected = 0.5 * (b * b - (s - s0) / a).exp() * erfc(b - (s - s0) / c);
            let actual = eich_profile(s, s0, 1.0, lq, spread);
            assert!((actual - expected).abs() <= 1.0e-9 * expected.max(1.0), "s={s}");
        }
        // Far inside the separatrix the naive form overflows.
        assert!(eich_profile(1.0, 2.2, 1.0, 5.0, 2.0).is_finite());
    }

    #[test]
    fn lobes_hold_the_peak_inside_lcfs_and_peak_at_lcfs() {
        let equilibrium = CircularEquilibrium::default();
        let map = MidplaneMap::build(&equilibrium, DivertorSide::LowField).expect("map");
        let psi = linear_grid(0.9, 1.1, 401).expect("grid");
        let profile =
            set_layer(&map, &psi, 5.0, 2.0, LayerAnchor::Lobes { lcfs: 0.97 }, 1.0).expect("layer");

        let peak = profile.q.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!((peak - 1.0).abs() < 1.0e-12);
        for (&value, &psi) in profile.q.iter().zip(&psi) {
            if psi < 0.97 {
                assert!((value - 1.0).abs() < 1.0e-3, "psi={psi} q={value}");
            }
        }
        let mut outside = profile
            .q
            .iter()
            .zip(&psi)
            .filter(|(_, psi)| **psi > 0.971)
            .map(|(q, _)| *q);
        assert!(outside.all(|q| q < 1.0));
        assert!(profile.q_separatrix < 1.0);
    }

    #[test]
    fn private_branch_meets_the_separatrix_value() {
        let equilibrium = CircularEquilibrium::default();
        let map = MidplaneMap::build(&equilibrium, DivertorSide::LowField).expect("map");
        let psi = vec![0.90, 0.95, 0.99, 0.999, 1.02, 1.05];
        let pfr = vec![true, true, true, true, false, false];

        let main = set_layer(&map, &psi, 5.0, 2.0, LayerAnchor::Lobes { lcfs: 0.97 }, 1.0)
            .expect("main");
        let shape = layer_shape(&map, &psi, &pfr, 5.0, 2.0, 0.97).expect("shape");

        let nearest = 3;
        assert!((shape[nearest] - main.q_separatrix).abs() < 1.0e-12);
        assert!(shape[0] < shape[nearest]);
        assert_eq!(shape[4], main.q[4]);
        assert_eq!(shape[5], main.q[5]);
    }

    #[test]
    fn high_field_side_mirrors_the_profile() {
        let equilibrium = CircularEquilibrium::default();
        let lfs = MidplaneMap::build(&equilibrium, DivertorSide::LowField).expect("lfs");
        let hfs = MidplaneMap::build(&equilibrium, DivertorSide::HighField).expect("hfs");
        let psi = linear_grid(0.95, 1.15, 201).expect("grid");
        let anchor = LayerAnchor::Lobes { lcfs: 0.97 };

        let low = set_layer(&lfs, &psi, 5.0, 2.0, anchor, 1.0).expect("lfs layer");
        let high = set_layer(&hfs, &psi, 5.0, 2.0, anchor, 1.0).expect("hfs layer");
        for ((l, h), psi) in low.q.iter().zip(&high.q).zip(&psi) {
            assert!((l - h).abs() < 1.0e-2, "psi={psi} lfs={l} hfs={h}");
        }
        assert_eq!(argmax(&low.q), argmax(&high.q));
    }

    #[test]
    fn symmetric_layer_peaks_mirror_about_the_separatrix() {
        let equilibrium = CircularEquilibrium::default();
        let lfs = MidplaneMap::build(&equilibrium, DivertorSide::LowField).expect("lfs");
        let hfs = MidplaneMap::build(&equilibrium, DivertorSide::HighField).expect("hfs");
        let psi = linear_grid(0.95, 1.1, 601).expect("grid");

        let low = set_layer(&lfs, &psi, 3.0, 3.0, LayerAnchor::Separatrix, 1.0).expect("lfs");
        let high = set_layer(&hfs, &psi, 3.0, 3.0, LayerAnchor::Separatrix, 1.0).expect("hfs");
        let low_peak = lfs.radius(psi[argmax(&low.q).expect("lfs peak")]);
        let high_peak = hfs.radius(psi[argmax(&high.q).expect("hfs peak")]);

        // Outward is +R on the low-field side and -R on the high-field side.
        let low_offset = low_peak - lfs.radius(1.0);
        let high_offset = hfs.radius(1.0) - high_peak;
        assert!(
            (low_offset - high_offset).abs() < 2.0e-4,
            "lfs offset {low_offset}, hfs offset {high_offset}"
        );
        assert!(low_peak > equilibrium.r_axis && high_peak < equilibrium.r_axis);
        assert!((low.q_separatrix - high.q_separatrix).abs() < 5.0e-3);
    }
}
