//! Parallel-form PID with clamped integrator and derivative-on-error.

/// Gains and output limits. `ki_out_max` bounds the integrator alone;
/// `out_max` bounds the final clamped output — both are commonly set to the
/// same bus-voltage-derived limit by the current loops (see
/// [`crate::foc::FocCore`]'s per-tick `iq`/`id` loop setup).
#[derive(Clone, Copy, Debug, Default)]
pub struct PidConfig {
    pub fs: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub ki_out_max: f32,
    pub out_max: f32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Pid {
    pub cfg: PidConfig,
    err: f32,
    prev_err: f32,
    kp_out: f32,
    ki_out: f32,
    kd_out: f32,
    pub out: f32,
}

impl Pid {
    pub fn new(cfg: PidConfig) -> Self {
        Self {
            cfg,
            ..Default::default()
        }
    }

    /// Zeroes every runtime field (but not `cfg`) — the reset contract the
    /// `Disable` stage of the FOC state machine relies on.
    pub fn reset(&mut self) {
        self.err = 0.0;
        self.prev_err = 0.0;
        self.kp_out = 0.0;
        self.ki_out = 0.0;
        self.kd_out = 0.0;
        self.out = 0.0;
    }

    /// Runs one control step: `ref` - `fdb` error, clamped-integral PID,
    /// plus a feedforward term added after the clamp-free sum and before
    /// the final output clamp.
    pub fn exec(&mut self, reference: f32, fdb: f32, ffd: f32) -> f32 {
        self.err = reference - fdb;

        self.kp_out = self.cfg.kp * self.err;
        self.ki_out += self.cfg.ki * self.err / self.cfg.fs;
        self.ki_out = self.ki_out.clamp(-self.cfg.ki_out_max, self.cfg.ki_out_max);
        self.kd_out = self.cfg.kd * (self.err - self.prev_err) * self.cfg.fs;
        self.prev_err = self.err;

        self.out = self.kp_out + self.ki_out + self.kd_out + ffd;
        self.out = self.out.clamp(-self.cfg.out_max, self.cfg.out_max);
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportional_only_tracks_error_instantly() {
        let mut pid = Pid::new(PidConfig {
            fs: 1000.0,
            kp: 2.0,
            ki: 0.0,
            kd: 0.0,
            ki_out_max: 10.0,
            out_max: 100.0,
        });
        assert_eq!(pid.exec(5.0, 1.0, 0.0), 8.0);
    }

    #[test]
    fn integrator_accumulates_and_clamps() {
        let mut pid = Pid::new(PidConfig {
            fs: 1.0,
            kp: 0.0,
            ki: 1.0,
            kd: 0.0,
            ki_out_max: 2.5,
            out_max: 100.0,
        });
        for _ in 0..10 {
            pid.exec(1.0, 0.0, 0.0);
        }
        assert_eq!(pid.out, 2.5);
    }

    #[test]
    fn output_clamp_wins_over_feedforward() {
        let mut pid = Pid::new(PidConfig {
            fs: 1000.0,
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            ki_out_max: 100.0,
            out_max: 5.0,
        });
        assert_eq!(pid.exec(1.0, 0.0, 100.0), 5.0);
    }

    #[test]
    fn reset_zeroes_runtime_state_not_config() {
        let mut pid = Pid::new(PidConfig {
            fs: 1000.0,
            kp: 1.0,
            ki: 1.0,
            kd: 1.0,
            ki_out_max: 10.0,
            out_max: 10.0,
        });
        pid.exec(3.0, 0.0, 0.0);
        pid.reset();
        assert_eq!(pid.out, 0.0);
        assert_eq!(pid.cfg.kp, 1.0);
    }
}
