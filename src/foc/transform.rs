//! Clarke and Park transforms between the three-phase, stationary
//! two-phase, and rotor-aligned frames.

use super::types::{div_sqrt_3_by_2, AlphaBeta, Dq, Uvw};

/// uvw → αβ, scaled by the modulation index `mi`.
pub fn clarke(uvw: Uvw, mi: f32) -> AlphaBeta {
    AlphaBeta {
        a: mi * (uvw.u - 0.5 * (uvw.v + uvw.w)),
        b: mi * (uvw.v - uvw.w) * div_sqrt_3_by_2(),
    }
}

/// αβ → uvw (inverse Clarke, unscaled — the modulation index is folded into
/// `clarke` on the way in, not undone here, matching the original).
pub fn inv_clarke(ab: AlphaBeta) -> Uvw {
    let a = -(ab.a * 0.5);
    let b = ab.b * div_sqrt_3_by_2();
    Uvw {
        u: ab.a,
        v: a + b,
        w: a - b,
    }
}

/// αβ → dq at rotor angle `theta`.
pub fn park(ab: AlphaBeta, theta: f32) -> Dq {
    let (s, c) = theta.sin_cos();
    Dq {
        d: c * ab.a + s * ab.b,
        q: c * ab.b - s * ab.a,
    }
}

/// dq → αβ at rotor angle `theta`.
pub fn inv_park(dq: Dq, theta: f32) -> AlphaBeta {
    let (s, c) = theta.sin_cos();
    AlphaBeta {
        a: c * dq.d - s * dq.q,
        b: s * dq.d + c * dq.q,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clarke_park_round_trip_at_zero_theta() {
        let mi = (2.0f32 / 3.0).sqrt();
        let uvw = Uvw {
            u: 1.0,
            v: -0.5,
            w: -0.5,
        };
        let ab = clarke(uvw, mi);
        assert!((ab.a - mi * 1.5).abs() < 1e-5);
        assert!(ab.b.abs() < 1e-5);

        let dq = park(ab, 0.0);
        assert!((dq.d - ab.a).abs() < 1e-5);
        assert!(dq.q.abs() < 1e-5);

        let ab2 = inv_park(dq, 0.0);
        assert!((ab2.a - ab.a).abs() < 1e-5);
        assert!((ab2.b - ab.b).abs() < 1e-5);

        let uvw2 = inv_clarke(ab2);
        assert!((uvw2.u - ab.a).abs() < 1e-5);
    }

    #[test]
    fn park_inv_park_round_trip_at_nonzero_theta() {
        let ab = AlphaBeta { a: 0.3, b: -0.7 };
        let theta = 1.234;
        let dq = park(ab, theta);
        let back = inv_park(dq, theta);
        assert!((back.a - ab.a).abs() < 1e-5);
        assert!((back.b - ab.b).abs() < 1e-5);
    }
}
