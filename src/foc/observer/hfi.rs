//! d-axis high-frequency injection observer, with its own 3-window polarity
//! identification sub-state-machine.

use crate::foc::filter::BiquadBandpass;
use crate::foc::pll::{Pll, PllConfig};
use crate::foc::types::{warp_tau, Dq, PI, TAU};

#[derive(Clone, Copy, Debug)]
pub struct HfiConfig {
    pub fs: f32,
    /// Injection frequency.
    pub fh: f32,
    pub hfi_vd: f32,
    pub hfi_id: f32,
    pub id_lpf_fc: f32,
    pub iq_lpf_fc: f32,
    pub bpf_q: f32,
    pub pll: PllConfig,
}

/// Polarity-identification sub-state. Three equal-length windows of
/// `fs/3` ticks: settle, inject `+id`, inject `-id`; the window with the
/// larger observed `|id|` response wins and sets `polar_offset`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Polarity {
    #[default]
    Ready,
    Positive,
    Negative,
    Finish,
}

pub struct Hfi {
    cfg: HfiConfig,
    id_bpf: BiquadBandpass,
    iq_bpf: BiquadBandpass,
    pll: Pll,

    hfi_theta: f32,
    lpf_id: f32,
    hfi_theta_err: f32,

    polar: Polarity,
    polar_cnt: u32,
    polar_cnt_max: u32,
    id_pos: f32,
    id_neg: f32,
    polar_offset: f32,

    pub theta: f32,
    pub omega: f32,
    pub id: f32,
    pub vd: f32,
}

impl Hfi {
    pub fn new(cfg: HfiConfig) -> Self {
        Self {
            id_bpf: BiquadBandpass::new(cfg.fs, cfg.fh, cfg.bpf_q),
            iq_bpf: BiquadBandpass::new(cfg.fs, cfg.fh, cfg.bpf_q),
            pll: Pll::new(cfg.pll),
            polar_cnt_max: (cfg.fs / 3.0) as u32,
            cfg,
            hfi_theta: 0.0,
            lpf_id: 0.0,
            hfi_theta_err: 0.0,
            polar: Polarity::Ready,
            polar_cnt: 0,
            id_pos: 0.0,
            id_neg: 0.0,
            polar_offset: 0.0,
            theta: 0.0,
            omega: 0.0,
            id: 0.0,
            vd: 0.0,
        }
    }

    pub fn polarity(&self) -> Polarity {
        self.polar
    }

    fn polar_idf(&mut self) {
        self.id = 0.0;
        match self.polar {
            Polarity::Ready => {
                if self.polar_cnt > self.polar_cnt_max {
                    self.polar = Polarity::Positive;
                }
            }
            Polarity::Positive => {
                self.id = self.cfg.hfi_id;
                self.id_pos += self.lpf_id.abs();
                if self.polar_cnt > self.polar_cnt_max * 2 {
                    self.polar = Polarity::Negative;
                }
            }
            Polarity::Negative => {
                self.id = -self.cfg.hfi_id;
                self.id_neg += self.lpf_id.abs();
                if self.polar_cnt == self.polar_cnt_max * 3 {
                    self.polar_offset = if self.id_pos.abs() > self.id_neg.abs() {
                        0.0
                    } else {
                        PI
                    };
                    self.polar_cnt = 0;
                    self.polar = Polarity::Finish;
                }
            }
            Polarity::Finish => return,
        }
        self.polar_cnt += 1;
    }

    pub fn exec(&mut self, i_dq: Dq) {
        let id_bp = self.id_bpf.exec(i_dq.d);
        let iq_bp = self.iq_bpf.exec(i_dq.q);

        let hfi_id = id_bp * self.hfi_theta.sin();
        let hfi_iq = iq_bp * self.hfi_theta.sin();

        let rc_id = 1.0 / (TAU * self.cfg.id_lpf_fc);
        let alpha_id = 1.0 / (1.0 + rc_id * self.cfg.fs);
        self.lpf_id = alpha_id * hfi_id + (1.0 - alpha_id) * self.lpf_id;

        let rc_iq = 1.0 / (TAU * self.cfg.iq_lpf_fc);
        let alpha_iq = 1.0 / (1.0 + rc_iq * self.cfg.fs);
        self.hfi_theta_err = alpha_iq * hfi_iq + (1.0 - alpha_iq) * self.hfi_theta_err;

        self.pll.exec_err_in(self.hfi_theta_err);

        self.hfi_theta += TAU * self.cfg.fh / self.cfg.fs;
        self.hfi_theta = warp_tau(self.hfi_theta);
        self.vd = self.cfg.hfi_vd * self.hfi_theta.cos();

        self.polar_idf();

        self.theta = warp_tau(self.pll.theta + self.polar_offset);
        self.omega = self.pll.omega;
    }

    pub fn reset(&mut self) {
        let cfg = self.cfg;
        *self = Self::new(cfg);
    }
}
