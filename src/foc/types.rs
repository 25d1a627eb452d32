//! Frame vectors and configuration structs shared across the FOC pipeline.

pub const TAU: f32 = 6.2831853;
pub const PI: f32 = 3.1415926;
const DIV_SQRT_3_BY_2: f32 = 0.8660254;
const SQRT_3: f32 = 1.7320508;

/// Wraps `rad` into `(-PI, PI]`.
pub fn warp_pi(rad: f32) -> f32 {
    let mut r = rad;
    if r.abs() > TAU {
        r %= TAU;
    }
    if r > PI {
        r -= TAU;
    } else if r < -PI {
        r += TAU;
    }
    r
}

/// Wraps `rad` into `[0, TAU)`.
pub fn warp_tau(rad: f32) -> f32 {
    let mut r = rad;
    if r.abs() > TAU {
        r %= TAU;
    }
    if r < 0.0 {
        r += TAU;
    }
    r
}

#[derive(Clone, Copy, Default, Debug)]
pub struct Uvw {
    pub u: f32,
    pub v: f32,
    pub w: f32,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct UvwRaw {
    pub u: i32,
    pub v: i32,
    pub w: i32,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct AlphaBeta {
    pub a: f32,
    pub b: f32,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct Dq {
    pub d: f32,
    pub q: f32,
}

/// Raw ADC snapshot: three phase currents plus bus voltage, all in counts.
#[derive(Clone, Copy, Default, Debug)]
pub struct AdcRaw {
    pub i_uvw: UvwRaw,
    pub v_bus: i32,
}

/// Motor electrical parameters used by the current loops and observers.
#[derive(Clone, Copy, Debug)]
pub struct MotorConfig {
    pub npp: u32,
    pub rs: f32,
    pub ld: f32,
    pub lq: f32,
    pub psi: f32,
    /// Current-loop bandwidth used to derive `kp`/`ki` for the d/q PIs.
    pub wc: f32,
    /// Rotor inertia. Carried for data-model completeness; no control loop
    /// in this crate consumes it directly (none of the velocity/position
    /// PIDs are gain-scheduled off it).
    pub inertia: f32,
}

/// Peripheral scaling and timing constants.
#[derive(Clone, Copy, Debug)]
pub struct PeriphConfig {
    pub adc_full_cnt: f32,
    pub cur_range: f32,
    pub vbus_range: f32,
    pub timer_freq: f32,
    pub pwm_freq: f32,
    pub pwm_min: f32,
    pub pwm_max: f32,
    pub mi: f32,
    /// Calibration sample budget; MUST be a power of two (shift-right
    /// averaging assumes this).
    pub adc_cali_cnt_max: u32,
    pub theta_cali_cnt_max: u32,
}

impl PeriphConfig {
    pub fn adc_to_cur(&self) -> f32 {
        self.cur_range / self.adc_full_cnt
    }
    pub fn adc_to_vbus(&self) -> f32 {
        self.vbus_range / self.adc_full_cnt
    }
    pub fn pwm_full_cnt(&self) -> u32 {
        (self.timer_freq / self.pwm_freq) as u32
    }
}

pub fn mech_to_elec(theta: f32, npp: u32) -> f32 {
    theta * npp as f32
}

pub fn elec_to_mech(theta: f32, npp: u32) -> f32 {
    theta / npp as f32
}

pub const fn sqrt_3() -> f32 {
    SQRT_3
}

pub const fn div_sqrt_3_by_2() -> f32 {
    DIV_SQRT_3_BY_2
}
