//! Field-oriented control pipeline: calibration, rotor-angle tracking, and
//! the cascaded current/velocity/position control loops that turn a
//! reference into three PWM duties.

pub mod filter;
pub mod observer;
pub mod pid;
pub mod pll;
pub mod svpwm;
pub mod transform;
pub mod types;

use crate::error::{Error, Result};
use observer::{Hfi, Smo};
use pid::{Pid, PidConfig};
use pll::{Pll, PllConfig};
use transform::{clarke, inv_park, park};
use types::{
    warp_pi, warp_tau, elec_to_mech, mech_to_elec, sqrt_3, AdcRaw, AlphaBeta, Dq, MotorConfig,
    PeriphConfig, Uvw, UvwRaw,
};

/// Hardware access the pipeline drives each tick: current/bus-voltage
/// sampling, mechanical angle sensing, PWM duty output, and gate enable.
pub trait Peripheral {
    fn get_adc(&mut self) -> AdcRaw;
    fn get_theta(&mut self) -> f32;
    fn set_pwm(&mut self, pwm_full_cnt: u32, duty: svpwm::UvwCount);
    fn set_drv(&mut self, enable: bool);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum State {
    #[default]
    Null,
    Cali,
    Ready,
    Disable,
    Enable,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ThetaSource {
    #[default]
    Null,
    Force,
    Sensor,
    Sensorless,
    /// Reserved for a fused sensor+observer estimate; the error term
    /// ([`Rotor::fusion_theta_err`]) is computed every tick but nothing
    /// currently selects `theta`/`omega` from it.
    SensorFusion,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ObsKind {
    #[default]
    Null,
    Smo,
    Hfi,
    /// Luenberger observer. No-op in the source this pipeline is grounded
    /// on (`lbg_exec` has an empty body); kept as a dispatch target for
    /// fidelity, not because it contributes an estimate.
    Lbg,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Mode {
    #[default]
    Null,
    /// Open-loop voltage mode. No-op: nothing writes `ref_i_dq`/`v_dq` from
    /// it, matching the source this is grounded on.
    Vol,
    Current,
    Velocity,
    Position,
    Pd,
    /// Reserved for an auto speed/current ramp sequencer; not exercised by
    /// this pipeline (no-op, same as the source it's grounded on).
    Asc,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CaliState {
    #[default]
    Init,
    Cw,
    Ccw,
    Finish,
}

/// Position/velocity/current/torque reference the caller drives the loop
/// with; which fields matter depends on the active [`Mode`].
#[derive(Clone, Copy, Default, Debug)]
pub struct RefPvct {
    pub pos: f32,
    pub ffd_vel: f32,
    pub vel: f32,
    pub ffd_cur: f32,
    pub cur: f32,
    pub tor: f32,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct FdbPvct {
    pub pos: f32,
    pub vel: f32,
    pub cur: f32,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct Rotor {
    pub theta: f32,
    pub comp_theta: f32,
    pub omega: f32,
    pub force_theta: f32,
    pub force_omega: f32,
    pub sensor_theta: f32,
    pub sensor_comp_theta: f32,
    pub sensor_omega: f32,
    pub obs_theta: f32,
    pub obs_omega: f32,
    pub fusion_theta_err: f32,
    pub mech_cycle_cnt: i32,
    pub mech_theta: f32,
    pub mech_prev_theta: f32,
    pub mech_total_theta: f32,
    pub mech_omega: f32,
}

/// Static configuration: motor/peripheral constants, calibration
/// parameters, and the outer-loop PID gains. Built once and handed to
/// [`FocCore::new`]; the loop-divisor fields only ever influence the
/// derived `fs` each PID is constructed with — nothing in this pipeline
/// gates dispatch at a sub-rate off them (no source file this is grounded
/// on does either, despite a same-named per-tick counter being carried in
/// the original's runtime state).
#[derive(Clone, Copy, Debug)]
pub struct FocConfig {
    pub exec_freq: f32,
    pub motor: MotorConfig,
    pub periph: PeriphConfig,
    pub ref_theta_cali_id: f32,
    pub ref_theta_cali_omega: f32,
    pub sensor_theta_comp_gain: f32,
    pub theta_comp_gain: f32,
    pub vel: PidConfig,
    pub pos: PidConfig,
    pub pd_kp: f32,
    pub pd_kd: f32,
    pub cur_div: u32,
    pub vel_div: u32,
    pub pos_div: u32,
    pub pd_div: u32,
}

pub struct FocCore<P: Peripheral> {
    cfg: FocConfig,
    ops: P,

    state: State,
    theta_src: ThetaSource,
    obs_kind: ObsKind,
    mode: Mode,
    cali: CaliState,

    adc_offset: UvwRaw,
    adc_offset_sum: UvwRaw,
    theta_offset: f32,
    adc_cali_cnt: u32,
    theta_cali_cnt: u32,
    theta_cali_hold_cnt: u32,
    theta_offset_sum: f32,

    ref_pvct: RefPvct,
    fdb_pvct: FdbPvct,
    ref_i_dq: Dq,
    ffd_v_dq: Dq,

    rotor: Rotor,
    adc_raw: AdcRaw,
    v_bus: f32,
    i_uvw: Uvw,
    i_ab: AlphaBeta,
    i_dq: Dq,

    v_dq: Dq,
    v_ab: AlphaBeta,
    svpwm: svpwm::Svpwm,

    pll: Pll,
    id_pid: Pid,
    iq_pid: Pid,
    vel_pid: Pid,
    pos_pid: Pid,
    smo: Option<Smo>,
    hfi: Option<Hfi>,

    exec_cnt: u64,
}

impl<P: Peripheral> FocCore<P> {
    /// Builds the pipeline. `smo`/`hfi` configs are optional: pass `None`
    /// for whichever observer [`ObsKind`] never selects, matching the
    /// original's single always-allocated-but-conditionally-used observer
    /// slots (here, skipping allocation when unused is the idiomatic
    /// choice).
    pub fn new(
        cfg: FocConfig,
        ops: P,
        smo_cfg: Option<observer::smo::SmoConfig>,
        hfi_cfg: Option<observer::hfi::HfiConfig>,
    ) -> Self {
        let cur_pid_cfg = PidConfig {
            fs: cfg.exec_freq / cfg.cur_div as f32,
            kp: cfg.motor.wc * cfg.motor.ld,
            ki: cfg.motor.wc * cfg.motor.rs,
            kd: 0.0,
            ki_out_max: 0.0,
            out_max: 0.0,
        };
        let vel_cfg = PidConfig {
            fs: cfg.exec_freq / cfg.vel_div as f32,
            ..cfg.vel
        };
        let pos_cfg = PidConfig {
            fs: cfg.exec_freq / cfg.pos_div as f32,
            ..cfg.pos
        };

        Self {
            pll: Pll::new(PllConfig::new(cfg.exec_freq, 0.0, 0.707, 0.0)),
            id_pid: Pid::new(cur_pid_cfg),
            iq_pid: Pid::new(cur_pid_cfg),
            vel_pid: Pid::new(vel_cfg),
            pos_pid: Pid::new(pos_cfg),
            smo: smo_cfg.map(Smo::new),
            hfi: hfi_cfg.map(Hfi::new),
            ops,
            cfg,
            state: State::Null,
            theta_src: ThetaSource::Null,
            obs_kind: ObsKind::Null,
            mode: Mode::Null,
            cali: CaliState::Init,
            adc_offset: UvwRaw::default(),
            adc_offset_sum: UvwRaw::default(),
            theta_offset: 0.0,
            adc_cali_cnt: 0,
            theta_cali_cnt: 0,
            theta_cali_hold_cnt: 0,
            theta_offset_sum: 0.0,
            ref_pvct: RefPvct::default(),
            fdb_pvct: FdbPvct::default(),
            ref_i_dq: Dq::default(),
            ffd_v_dq: Dq::default(),
            rotor: Rotor::default(),
            adc_raw: AdcRaw::default(),
            v_bus: 0.0,
            i_uvw: Uvw::default(),
            i_ab: AlphaBeta::default(),
            i_dq: Dq::default(),
            v_dq: Dq::default(),
            v_ab: AlphaBeta::default(),
            svpwm: svpwm::Svpwm::default(),
            exec_cnt: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn cali_state(&self) -> CaliState {
        self.cali
    }

    pub fn rotor(&self) -> Rotor {
        self.rotor
    }

    pub fn svpwm(&self) -> svpwm::Svpwm {
        self.svpwm
    }

    pub fn set_obs_kind(&mut self, kind: ObsKind) {
        self.obs_kind = kind;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn set_theta_source(&mut self, src: ThetaSource) {
        self.theta_src = src;
    }

    pub fn set_ref(&mut self, ref_pvct: RefPvct) {
        self.ref_pvct = ref_pvct;
    }

    /// Starts the calibration sequence. Only valid from `Ready`/`Disable`;
    /// an attempt from `Enable` is rejected since enable's per-tick drive
    /// output would otherwise race the calibration routines' own
    /// `set_drv`/`set_pwm` calls.
    pub fn start_cali(&mut self) -> Result<()> {
        if self.state == State::Enable {
            return Err(Error::Busy("cannot calibrate while enabled".into()));
        }
        self.cali = CaliState::Init;
        self.state = State::Cali;
        Ok(())
    }

    pub fn enable(&mut self) -> Result<()> {
        if !matches!(self.state, State::Ready | State::Disable) {
            return Err(Error::InvalidArgument(
                "enable only valid from Ready or Disable".into(),
            ));
        }
        self.state = State::Enable;
        Ok(())
    }

    pub fn disable(&mut self) {
        self.state = State::Disable;
    }

    /// One control tick: reads the mechanical angle, advances whichever
    /// state the pipeline is in, then publishes the feedback snapshot.
    pub fn exec(&mut self) {
        self.exec_cnt += 1;
        self.rotor_cal();

        match self.state {
            State::Cali => self.cali_step(),
            State::Ready | State::Null => {}
            State::Disable => self.disable_stage(),
            State::Enable => self.enable_stage(),
        }

        self.get_fdb();
    }

    fn rotor_cal(&mut self) {
        let prev = self.rotor.mech_theta;
        self.rotor.mech_theta = self.ops.get_theta();

        let delta = self.rotor.mech_theta - prev;
        if delta < -types::TAU * 0.5 {
            self.rotor.mech_cycle_cnt += 1;
        } else if delta > types::TAU * 0.5 {
            self.rotor.mech_cycle_cnt -= 1;
        }
        self.rotor.mech_total_theta =
            self.rotor.mech_cycle_cnt as f32 * types::TAU + self.rotor.mech_theta;
        self.rotor.mech_prev_theta = self.rotor.mech_theta;

        self.rotor.sensor_theta =
            mech_to_elec(self.rotor.mech_theta, self.cfg.motor.npp) - self.theta_offset;
        self.rotor.sensor_comp_theta =
            self.cfg.sensor_theta_comp_gain * self.rotor.sensor_omega / self.cfg.exec_freq;
        self.rotor.sensor_theta += self.rotor.sensor_comp_theta;
        self.rotor.sensor_theta = warp_tau(self.rotor.sensor_theta);

        self.pll.exec_theta_in(self.rotor.sensor_theta);
        self.rotor.sensor_omega = self.pll.lpf_omega;

        self.rotor.mech_omega = elec_to_mech(self.rotor.sensor_omega, self.cfg.motor.npp);

        if self.theta_src == ThetaSource::Sensor {
            self.rotor.theta = self.rotor.sensor_theta;
            self.rotor.omega = self.rotor.sensor_omega;
        }
    }

    fn get_fdb(&mut self) {
        self.fdb_pvct.pos = self.rotor.mech_total_theta;
        self.fdb_pvct.vel = self.rotor.mech_omega;
        self.fdb_pvct.cur = self.i_dq.q;
    }

    fn select_theta(&mut self) {
        match self.theta_src {
            ThetaSource::Force => {
                self.rotor.theta = self.rotor.force_theta;
                self.rotor.omega = self.rotor.force_omega;
            }
            ThetaSource::Sensor => {
                self.rotor.theta = self.rotor.sensor_theta;
                self.rotor.omega = self.rotor.sensor_omega;
            }
            ThetaSource::Sensorless => {
                self.rotor.theta = self.rotor.obs_theta;
                self.rotor.omega = self.rotor.obs_omega;
            }
            ThetaSource::SensorFusion | ThetaSource::Null => {}
        }
    }

    fn obs_i_ab(&mut self) {
        if self.obs_kind == ObsKind::Smo {
            if let Some(smo) = &mut self.smo {
                smo.exec(self.i_ab, self.v_ab);
                self.rotor.obs_theta = smo.theta;
                self.rotor.obs_omega = smo.omega;
            }
        }
    }

    fn obs_i_dq(&mut self) {
        if self.obs_kind == ObsKind::Hfi {
            if let Some(hfi) = &mut self.hfi {
                hfi.exec(self.i_dq);
                self.rotor.obs_theta = hfi.theta;
                self.rotor.obs_omega = hfi.omega;
                self.ref_i_dq.d = hfi.id;
            }
        }
    }

    fn obs_v_dq(&mut self) {
        if self.obs_kind == ObsKind::Hfi {
            if let Some(hfi) = &self.hfi {
                self.v_dq.d += hfi.vd;
            }
        }
    }

    fn mode_ctl(&mut self) {
        match self.mode {
            Mode::Current => {
                self.ref_i_dq.q = self.ref_pvct.cur;
            }
            Mode::Pd => {
                self.ref_i_dq.q = self.cfg.pd_kp * (self.ref_pvct.pos - self.fdb_pvct.pos)
                    + self.cfg.pd_kd * (self.ref_pvct.vel - self.fdb_pvct.vel)
                    + self.ref_pvct.tor;
            }
            Mode::Velocity => {
                self.ref_i_dq.q =
                    self.vel_pid
                        .exec(self.ref_pvct.vel, self.fdb_pvct.vel, self.ref_pvct.ffd_cur);
            }
            Mode::Position => {
                self.ref_pvct.vel =
                    self.pos_pid
                        .exec(self.ref_pvct.pos, self.fdb_pvct.pos, self.ref_pvct.ffd_vel);
                self.ref_i_dq.q =
                    self.vel_pid
                        .exec(self.ref_pvct.vel, self.fdb_pvct.vel, self.ref_pvct.ffd_cur);
            }
            Mode::Vol | Mode::Asc | Mode::Null => {}
        }
    }

    fn enable_stage(&mut self) {
        self.ops.set_drv(true);

        self.adc_raw = self.ops.get_adc();
        let i_u = (self.adc_raw.i_uvw.u - self.adc_offset.u) as f32 * self.cfg.periph.adc_to_cur();
        let i_v = (self.adc_raw.i_uvw.v - self.adc_offset.v) as f32 * self.cfg.periph.adc_to_cur();
        let i_w = (self.adc_raw.i_uvw.w - self.adc_offset.w) as f32 * self.cfg.periph.adc_to_cur();
        self.i_uvw = Uvw {
            u: i_u,
            v: i_v,
            w: i_w,
        };
        self.v_bus = self.adc_raw.v_bus as f32 * self.cfg.periph.adc_to_vbus();

        self.i_ab = clarke(self.i_uvw, self.cfg.periph.mi);

        self.obs_i_ab();
        self.select_theta();

        self.i_dq = park(self.i_ab, self.rotor.theta);

        self.obs_i_dq();

        self.rotor.fusion_theta_err = warp_pi(self.rotor.sensor_theta - self.rotor.obs_theta);

        self.mode_ctl();

        let i_lim = self.v_bus / sqrt_3() * self.cfg.periph.pwm_max;

        self.iq_pid.cfg.ki_out_max = i_lim;
        self.iq_pid.cfg.out_max = i_lim;
        self.ffd_v_dq.q = self.rotor.omega * self.cfg.motor.psi * 0.7;
        self.v_dq.q = self.iq_pid.exec(self.ref_i_dq.q, self.i_dq.q, self.ffd_v_dq.q);

        self.id_pid.cfg.ki_out_max = i_lim;
        self.id_pid.cfg.out_max = i_lim;
        self.ffd_v_dq.d = -self.rotor.omega * self.cfg.motor.lq * self.i_dq.q * 0.7;
        self.v_dq.d = self.id_pid.exec(self.ref_i_dq.d, self.i_dq.d, self.ffd_v_dq.d);

        self.obs_v_dq();

        self.rotor.comp_theta = self.cfg.theta_comp_gain * self.rotor.omega / self.cfg.exec_freq;
        self.v_ab = inv_park(self.v_dq, self.rotor.theta + self.rotor.comp_theta);

        let v_ab_sv = AlphaBeta {
            a: self.v_ab.a / self.v_bus,
            b: self.v_ab.b / self.v_bus,
        };
        self.svpwm = svpwm::exec(
            v_ab_sv,
            self.cfg.periph.pwm_min,
            self.cfg.periph.pwm_max,
            self.cfg.periph.pwm_full_cnt(),
        );
        self.ops
            .set_pwm(self.cfg.periph.pwm_full_cnt(), self.svpwm.duty_cnt);
    }

    fn disable_stage(&mut self) {
        self.ops.set_drv(false);

        self.i_ab = AlphaBeta::default();
        self.i_dq = Dq::default();
        self.i_uvw = Uvw::default();
        self.v_dq = Dq::default();
        self.v_ab = AlphaBeta::default();

        self.id_pid.reset();
        self.iq_pid.reset();
        if let Some(smo) = &mut self.smo {
            smo.reset();
        }
        if let Some(hfi) = &mut self.hfi {
            hfi.reset();
        }

        // Park the last PWM write at the zero-voltage (centered) duty
        // rather than leaving the previous cycle's duty latched.
        self.svpwm = svpwm::exec(
            AlphaBeta::default(),
            self.cfg.periph.pwm_min,
            self.cfg.periph.pwm_max,
            self.cfg.periph.pwm_full_cnt(),
        );
        self.ops
            .set_pwm(self.cfg.periph.pwm_full_cnt(), self.svpwm.duty_cnt);
    }

    fn adc_cali(&mut self) -> bool {
        self.ops.set_drv(true);
        self.adc_raw = self.ops.get_adc();

        self.adc_offset_sum.u += self.adc_raw.i_uvw.u;
        self.adc_offset_sum.v += self.adc_raw.i_uvw.v;
        self.adc_offset_sum.w += self.adc_raw.i_uvw.w;

        self.adc_cali_cnt += 1;
        if self.adc_cali_cnt >= self.cfg.periph.adc_cali_cnt_max {
            let shift = self.cfg.periph.adc_cali_cnt_max.trailing_zeros();
            self.adc_offset = UvwRaw {
                u: self.adc_offset_sum.u >> shift,
                v: self.adc_offset_sum.v >> shift,
                w: self.adc_offset_sum.w >> shift,
            };
            self.ops.set_drv(false);
            true
        } else {
            false
        }
    }

    fn cali_step(&mut self) {
        match self.cali {
            CaliState::Init => {
                if !self.adc_cali() {
                    return;
                }
                self.ref_i_dq.d = self.cfg.ref_theta_cali_id;
                self.rotor.force_omega = self.cfg.ref_theta_cali_omega;
                self.mode = Mode::Current;
                self.theta_src = ThetaSource::Force;
                self.cali = CaliState::Cw;
            }
            CaliState::Cw => {
                self.enable_stage();
                if self.rotor.force_theta >= types::TAU {
                    self.rotor.force_theta = types::TAU;
                    self.theta_cali_hold_cnt += 1;
                    if self.theta_cali_hold_cnt >= self.cfg.periph.theta_cali_cnt_max {
                        self.theta_offset_sum += self.rotor.sensor_theta;
                        self.theta_cali_hold_cnt = 0;
                        self.theta_cali_cnt += 1;
                        if self.theta_cali_cnt >= self.cfg.motor.npp {
                            self.cali = CaliState::Ccw;
                        } else {
                            self.rotor.force_theta = 0.0;
                        }
                    }
                } else if self.theta_cali_hold_cnt == 0 {
                    self.rotor.force_theta += self.rotor.force_omega / self.cfg.exec_freq;
                }
            }
            CaliState::Ccw => {
                self.enable_stage();
                if self.rotor.force_theta <= 0.0 {
                    self.rotor.force_theta = 0.0;
                    self.theta_cali_hold_cnt += 1;
                    if self.theta_cali_hold_cnt >= self.cfg.periph.theta_cali_cnt_max {
                        self.theta_offset_sum += self.rotor.sensor_theta;
                        self.theta_cali_hold_cnt = 0;
                        self.theta_cali_cnt += 1;
                        if self.theta_cali_cnt >= self.cfg.motor.npp * 2 {
                            self.cali = CaliState::Finish;
                        } else {
                            self.rotor.force_theta = types::TAU;
                        }
                    }
                } else if self.theta_cali_hold_cnt == 0 {
                    self.rotor.force_theta -= self.rotor.force_omega / self.cfg.exec_freq;
                }
            }
            CaliState::Finish => {
                self.disable_stage();
                self.theta_offset = self.theta_offset_sum / self.theta_cali_cnt as f32;
                self.adc_cali_cnt = 0;
                self.theta_cali_cnt = 0;
                self.ref_i_dq.d = 0.0;
                self.rotor.force_theta = 0.0;
                self.rotor.force_omega = 0.0;
                self.mode = Mode::Null;
                self.theta_src = ThetaSource::Null;
                self.state = State::Ready;
            }
        }
    }
}
