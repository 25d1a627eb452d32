//! Center-aligned space-vector PWM via the min/max-shift method: subtract
//! the midpoint of the max and min phase voltages (the common-mode
//! injection that maximizes DC-bus utilization), not a full SVPWM sector
//! lookup.

use super::transform::inv_clarke;
use super::types::{AlphaBeta, Uvw};

#[derive(Clone, Copy, Default, Debug)]
pub struct Svpwm {
    pub v_uvw: Uvw,
    pub v_max: f32,
    pub v_min: f32,
    pub v_avg: f32,
    pub duty: Uvw,
    pub duty_cnt: UvwCount,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct UvwCount {
    pub u: u32,
    pub v: u32,
    pub w: u32,
}

/// `v_ab` MUST already be normalized by `Vbus` (the caller divides the
/// inverse-Park output by the bus voltage before calling this).
pub fn exec(v_ab: AlphaBeta, pwm_min: f32, pwm_max: f32, pwm_full_cnt: u32) -> Svpwm {
    let v_uvw = inv_clarke(v_ab);

    let (mut v_max, mut v_min) = if v_uvw.u > v_uvw.v {
        (v_uvw.u, v_uvw.v)
    } else {
        (v_uvw.v, v_uvw.u)
    };
    if v_uvw.w < v_min {
        v_min = v_uvw.w;
    } else if v_uvw.w > v_max {
        v_max = v_uvw.w;
    }

    let v_avg = 0.5 * (v_max + v_min);

    let clamp = |x: f32| (x - v_avg + 0.5).clamp(pwm_min, pwm_max);
    let duty = Uvw {
        u: clamp(v_uvw.u),
        v: clamp(v_uvw.v),
        w: clamp(v_uvw.w),
    };

    let scale = |d: f32| (d * pwm_full_cnt as f32) as u32;
    Svpwm {
        v_uvw,
        v_max,
        v_min,
        v_avg,
        duty,
        duty_cnt: UvwCount {
            u: scale(duty.u),
            v: scale(duty.v),
            w: scale(duty.w),
        },
    }
}
