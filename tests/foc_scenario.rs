//! Scenario 4: Clarke -> Park -> inverse-Park -> inverse-Clarke round-trip,
//! plus an end-to-end calibration-to-ready-to-enable run of the FOC state
//! machine against a fake peripheral.

use motorun::foc::svpwm::UvwCount;
use motorun::foc::transform::{clarke, inv_clarke, inv_park, park};
use motorun::foc::types::{MotorConfig, PeriphConfig, Uvw};
use motorun::foc::{FocConfig, FocCore, Mode, Peripheral, State, ThetaSource};
use motorun::foc::pid::PidConfig;

#[test]
fn clarke_park_round_trip_matches_scenario_4() {
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

struct FakePeripheral {
    theta: f32,
    i_d: i32,
    i_q: i32,
    v_bus: i32,
    drv_on: bool,
    last_duty: UvwCount,
}

impl Peripheral for FakePeripheral {
    fn get_adc(&mut self) -> motorun::foc::types::AdcRaw {
        motorun::foc::types::AdcRaw {
            i_uvw: motorun::foc::types::UvwRaw {
                u: self.i_d,
                v: self.i_q,
                w: 0,
            },
            v_bus: self.v_bus,
        }
    }
    fn get_theta(&mut self) -> f32 {
        self.theta
    }
    fn set_pwm(&mut self, _pwm_full_cnt: u32, duty: UvwCount) {
        self.last_duty = duty;
    }
    fn set_drv(&mut self, enable: bool) {
        self.drv_on = enable;
    }
}

fn cfg() -> FocConfig {
    FocConfig {
        exec_freq: 20_000.0,
        motor: MotorConfig {
            npp: 4,
            rs: 0.3,
            ld: 0.0003,
            lq: 0.0003,
            psi: 0.005,
            wc: 3000.0,
            inertia: 0.0,
        },
        periph: PeriphConfig {
            adc_full_cnt: 4096.0,
            cur_range: 40.0,
            vbus_range: 60.0,
            timer_freq: 160_000_000.0,
            pwm_freq: 20_000.0,
            pwm_min: 0.02,
            pwm_max: 0.98,
            mi: (2.0f32 / 3.0).sqrt(),
            adc_cali_cnt_max: 64,
            theta_cali_cnt_max: 4,
        },
        ref_theta_cali_id: 2.0,
        ref_theta_cali_omega: 40.0,
        sensor_theta_comp_gain: 0.0,
        theta_comp_gain: 0.0,
        vel: PidConfig {
            fs: 20_000.0,
            kp: 0.05,
            ki: 0.01,
            kd: 0.0,
            ki_out_max: 10.0,
            out_max: 10.0,
        },
        pos: PidConfig {
            fs: 20_000.0,
            kp: 10.0,
            ki: 0.0,
            kd: 0.0,
            ki_out_max: 0.0,
            out_max: 50.0,
        },
        pd_kp: 0.0,
        pd_kd: 0.0,
        cur_div: 1,
        vel_div: 1,
        pos_div: 1,
        pd_div: 1,
    }
}

#[test]
fn calibration_reaches_ready_then_enable_drives_current_mode() {
    let mut foc = FocCore::new(
        cfg(),
        FakePeripheral {
            theta: 0.0,
            i_d: 0,
            i_q: 0,
            v_bus: 1000,
            drv_on: false,
            last_duty: UvwCount::default(),
        },
        None,
        None,
    );

    foc.start_cali().unwrap();
    for _ in 0..2_000_000 {
        if foc.state() == State::Ready {
            break;
        }
        foc.exec();
    }
    assert_eq!(foc.state(), State::Ready);

    foc.set_mode(Mode::Current);
    foc.set_theta_source(ThetaSource::Sensor);
    foc.enable().unwrap();
    assert_eq!(foc.state(), State::Enable);

    foc.set_ref(motorun::foc::RefPvct {
        cur: 1.0,
        ..Default::default()
    });
    for _ in 0..50 {
        foc.exec();
    }
    assert_eq!(foc.state(), State::Enable);

    foc.disable();
    foc.exec();
    assert_eq!(foc.state(), State::Disable);
    assert!((foc.svpwm().duty.u - 0.5).abs() < 1e-6);
    assert!((foc.svpwm().duty.v - 0.5).abs() < 1e-6);
    assert!((foc.svpwm().duty.w - 0.5).abs() < 1e-6);
}
