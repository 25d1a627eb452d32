//! `motorun` — a concurrent runtime substrate for motor-control and
//! embedded data-plane systems.
//!
//! Four primitives compose into a small embedded control runtime:
//! a wait-free [`spsc`] byte ring, a lock-free [`mpsc`] variable-length
//! record log, a red-black-tree [`sched`] cooperative task scheduler, and
//! a [`foc`] Field-Oriented-Control state machine driven from a periodic
//! tick. [`shm`] lays an `spsc` ring over a named OS mapping for
//! cross-process transport; [`telemetry`] layers a formatted log façade
//! over `mpsc`; [`timebase`] is the monotonic/wall-clock source both the
//! scheduler and telemetry timestamp against.
//!
//! None of the four core primitives depend on each other — a caller wires
//! them together at the application layer the way [`sched::run_forever`]
//! dispatches a task whose callback happens to be an [`foc::FocCore::exec`]
//! tick, or a flush thread drains a [`telemetry::Logger`] backed by an
//! [`mpsc::Mpsc`] that [`foc`] callbacks write records into.

pub mod error;
pub mod foc;
pub mod mpsc;
pub mod sched;
pub mod shm;
pub mod spsc;
pub mod telemetry;
pub mod timebase;

pub use error::{Error, Result};
