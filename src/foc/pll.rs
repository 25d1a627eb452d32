//! Phase-locked loop used to smooth rotor angle and extract rotor speed.
//!
//! Two drive modes share one loop filter + VCO: [`Pll::exec_ab_in`] phase-
//! detects off an estimated back-EMF vector (used by [`super::observer::Smo`]),
//! [`Pll::exec_theta_in`] phase-detects off a raw angle (used directly by the
//! rotor-angle stage for the sensored theta source).

use super::types::{warp_pi, warp_tau, TAU};

#[derive(Clone, Copy, Debug, Default)]
pub struct PllConfig {
    pub fs: f32,
    pub wc: f32,
    pub damp: f32,
    pub lpf_fc: f32,
    kp: f32,
    ki: f32,
    ffd_lpf_fc: f32,
}

impl PllConfig {
    pub fn new(fs: f32, wc: f32, damp: f32, lpf_fc: f32) -> Self {
        Self {
            fs,
            wc,
            damp,
            lpf_fc,
            kp: 2.0 * wc * damp,
            ki: wc * wc,
            ffd_lpf_fc: 0.5 * lpf_fc,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Pll {
    pub cfg: PllConfig,
    pub theta: f32,
    pub omega: f32,
    pub lpf_omega: f32,
    ki_out: f32,
    prev_theta: f32,
    theta_err: f32,
    ffd_omega: f32,
    lpf_ffd_omega: f32,
}

impl Pll {
    pub fn new(cfg: PllConfig) -> Self {
        Self {
            cfg,
            ..Default::default()
        }
    }

    fn exec(&mut self) {
        self.ki_out += self.cfg.ki * self.theta_err / self.cfg.fs;
        self.omega = self.cfg.kp * self.theta_err + self.ki_out;

        let rc = 1.0 / (TAU * self.cfg.lpf_fc);
        let alpha = 1.0 / (1.0 + rc * self.cfg.fs);
        self.lpf_omega = alpha * self.omega + (1.0 - alpha) * self.lpf_omega;

        self.theta += self.omega / self.cfg.fs;
        self.theta = warp_tau(self.theta);
    }

    /// Phase detector against an αβ vector (e.g. estimated back-EMF): the
    /// error is `b*cos(theta) - a*sin(theta)`.
    pub fn exec_ab_in(&mut self, a: f32, b: f32) {
        let (s, c) = self.theta.sin_cos();
        self.theta_err = b * c - a * s;
        self.exec();
    }

    /// Runs the loop filter + VCO off a phase error computed externally
    /// (used by [`super::observer::Hfi`], whose phase detector is the
    /// low-passed HFI-band `iq` response rather than an αβ vector or a raw
    /// angle).
    pub fn exec_err_in(&mut self, theta_err: f32) {
        self.theta_err = theta_err;
        self.exec();
    }

    /// Phase detector against a raw angle; also derives a feedforward speed
    /// estimate by low-pass-filtering the wrapped angle derivative (unused by
    /// the loop filter itself, but published for callers that want a
    /// faster-settling speed estimate than `lpf_omega`).
    pub fn exec_theta_in(&mut self, theta: f32) {
        let mut diff = theta - self.prev_theta;
        diff = warp_pi(diff);
        self.ffd_omega = diff * self.cfg.fs;
        self.prev_theta = theta;

        let rc = 1.0 / (TAU * self.cfg.ffd_lpf_fc);
        let alpha = 1.0 / (1.0 + rc * self.cfg.fs);
        self.lpf_ffd_omega = alpha * self.ffd_omega + (1.0 - alpha) * self.lpf_ffd_omega;

        self.theta_err = warp_pi(theta - self.theta);
        self.exec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theta_in_locks_onto_a_constant_angle() {
        let mut pll = Pll::new(PllConfig::new(10_000.0, 500.0, 0.707, 50.0));
        for _ in 0..2000 {
            pll.exec_theta_in(1.0);
        }
        assert!((pll.theta - 1.0).abs() < 0.05);
    }

    #[test]
    fn ab_in_tracks_a_rotating_vector() {
        let mut pll = Pll::new(PllConfig::new(10_000.0, 2000.0, 0.707, 200.0));
        let omega = 100.0; // rad/s
        let mut t = 0.0f32;
        for _ in 0..20_000 {
            let theta = omega * t;
            pll.exec_ab_in(theta.cos(), theta.sin());
            t += 1.0 / 10_000.0;
        }
        assert!((pll.lpf_omega - omega).abs() < 5.0);
    }
}
