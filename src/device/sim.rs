//! # Simulated converter for bench runs and tests.
//!
//! [`SimulatedDriver`] models the converter's register file and sequencer the
//! way the hardware applies them, and journals every call in order:
//!
//! ```text
//! define_sequence(a, b)
//!   ├─► write 0x20+i = (b<<4 | a) [| SSREN on last]
//!   └─► CONFIG |= BURSTEN | SEQEN
//! start(..) / stop()      ─► acquiring flag
//! read_power_low()        ─► scripted flag (set_power_low)
//! ```
//!
//! Failures can be scripted per operation with [`SimulatedDriver::fail`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::protocol::{self, ADDRESS_MASK, CONFIG_BURST_SEQUENCE, Register, VALUE_MASK};
use super::session::{DeviceDriver, DeviceSession, StartRequest};
use crate::error::DeviceError;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Open { bus: u8, device: u8 },
    WriteRegister { address: u8, value: u16 },
    ReadRegister { address: u8 },
    DefineSequence { a: Vec<u8>, b: Vec<u8> },
    Start {
        sample_period_ms: u32,
        average_count: u32,
        output_dir: PathBuf,
        output_file: String,
    },
    Stop,
    ReadPowerLow,
    Close,
}

/// Operations whose failure can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Open,
    WriteRegister,
    ReadRegister,
    DefineSequence,
    Start,
    Stop,
    ReadPowerLow,
}

#[derive(Debug, Default)]
struct SimState {
    registers: HashMap<u8, u16>,
    journal: Vec<DeviceCall>,
    failing: Vec<Op>,
    power_low: bool,
    acquiring: bool,
    open_sessions: usize,
}

/// In-memory converter. Clones share the same device.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDriver {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scripts the level reported by `read_power_low`.
    pub fn set_power_low(&self, low: bool) {
        self.lock().power_low = low;
    }

    /// Makes every subsequent call of `op` fail.
    pub fn fail(&self, op: Op) {
        self.lock().failing.push(op);
    }

    /// Returns the calls recorded so far.
    pub fn journal(&self) -> Vec<DeviceCall> {
        self.lock().journal.clone()
    }

    /// Current value of a register (0 when never written).
    pub fn register(&self, address: u8) -> u16 {
        self.lock().registers.get(&address).copied().unwrap_or(0)
    }

    /// Whether periodic acquisition is running.
    pub fn is_acquiring(&self) -> bool {
        self.lock().acquiring
    }

    /// Number of sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }
}

impl DeviceDriver for SimulatedDriver {
    fn open(&self, bus: u8, device: u8) -> Result<Box<dyn DeviceSession>, DeviceError> {
        let mut st = self.lock();
        st.journal.push(DeviceCall::Open { bus, device });
        if st.failing.contains(&Op::Open) {
            return Err(DeviceError::Open {
                bus,
                device,
                reason: "simulated failure".into(),
            });
        }
        st.open_sessions += 1;
        info!(bus, device, "simulated converter session opened");
        Ok(Box::new(SimulatedSession {
            driver: self.clone(),
        }))
    }
}

struct SimulatedSession {
    driver: SimulatedDriver,
}

impl SimulatedSession {
    fn record(&self, call: DeviceCall, op: Op) -> Result<MutexGuard<'_, SimState>, String> {
        let mut st = self.driver.lock();
        st.journal.push(call);
        if st.failing.contains(&op) {
            return Err("simulated failure".into());
        }
        Ok(st)
    }
}

fn store(st: &mut SimState, address: u8, value: u16) {
    st.registers.insert(address & ADDRESS_MASK, value & VALUE_MASK);
}

impl DeviceSession for SimulatedSession {
    fn write_register(&mut self, address: u8, value: u16) -> Result<(), DeviceError> {
        let mut st = self
            .record(DeviceCall::WriteRegister { address, value }, Op::WriteRegister)
            .map_err(|reason| DeviceError::Register { address, reason })?;
        store(&mut st, address, value);
        Ok(())
    }

    fn read_register(&mut self, address: u8) -> Result<u16, DeviceError> {
        let st = self
            .record(DeviceCall::ReadRegister { address }, Op::ReadRegister)
            .map_err(|reason| DeviceError::Register { address, reason })?;
        Ok(st.registers.get(&(address & ADDRESS_MASK)).copied().unwrap_or(0))
    }

    fn define_sequence(&mut self, a: &[u8], b: &[u8]) -> Result<(), DeviceError> {
        let call = DeviceCall::DefineSequence {
            a: a.to_vec(),
            b: b.to_vec(),
        };
        let mut st = self
            .record(call, Op::DefineSequence)
            .map_err(|reason| DeviceError::Register {
                address: protocol::SEQUENCER_BASE,
                reason,
            })?;
        for (address, word) in protocol::sequence_writes(a, b)? {
            store(&mut st, address, word);
        }
        let config = Register::Configuration.address();
        let current = st.registers.get(&config).copied().unwrap_or(0);
        store(&mut st, config, current | CONFIG_BURST_SEQUENCE);
        Ok(())
    }

    fn start(&mut self, req: StartRequest<'_>) -> Result<(), DeviceError> {
        let call = DeviceCall::Start {
            sample_period_ms: req.sample_period_ms,
            average_count: req.average_count,
            output_dir: req.output_dir.to_path_buf(),
            output_file: req.output_file.to_string(),
        };
        let mut st = self
            .record(call, Op::Start)
            .map_err(|reason| DeviceError::Start { reason })?;
        st.acquiring = true;
        info!(
            period_ms = req.sample_period_ms,
            average = req.average_count,
            file = %req.output_dir.join(req.output_file).display(),
            "simulated acquisition started"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        let mut st = self
            .record(DeviceCall::Stop, Op::Stop)
            .map_err(|reason| DeviceError::Stop { reason })?;
        st.acquiring = false;
        Ok(())
    }

    fn read_power_low(&mut self) -> Result<bool, DeviceError> {
        let st = self
            .record(DeviceCall::ReadPowerLow, Op::ReadPowerLow)
            .map_err(|reason| DeviceError::PowerQuery { reason })?;
        Ok(st.power_low)
    }

    fn close(&mut self) {
        let mut st = self.driver.lock();
        st.journal.push(DeviceCall::Close);
        st.acquiring = false;
        st.open_sessions = st.open_sessions.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Session;

    #[test]
    fn define_sequence_programs_sequencer_and_config() {
        let drv = SimulatedDriver::new();
        let mut session = Session::open(&drv, 1, 0).expect("open");
        session
            .define_sequence(&[3, 2, 1], &[4, 5, 6])
            .expect("define");

        assert_eq!(drv.register(0x20), 0x43);
        assert_eq!(drv.register(0x21), 0x52);
        assert_eq!(drv.register(0x22), 0x161);
        assert_eq!(drv.register(2), 0x61);
    }

    #[test]
    fn register_writes_are_masked_to_wire_width() {
        let drv = SimulatedDriver::new();
        let mut session = Session::open(&drv, 1, 0).expect("open");
        session.write_register(0x45, 0xfff).expect("write");
        assert_eq!(drv.register(0x05), 0x1ff);
        assert_eq!(session.read_registers(&[5, 6]).expect("read"), vec![0x1ff, 0]);
    }

    #[test]
    fn dropping_session_closes_it_once() {
        let drv = SimulatedDriver::new();
        {
            let _session = Session::open(&drv, 1, 0).expect("open");
            assert_eq!(drv.open_sessions(), 1);
        }
        assert_eq!(drv.open_sessions(), 0);
        let closes = drv
            .journal()
            .into_iter()
            .filter(|c| *c == DeviceCall::Close)
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn scripted_failures_surface_as_device_errors() {
        let drv = SimulatedDriver::new();
        drv.fail(Op::Start);
        let mut session = Session::open(&drv, 1, 0).expect("open");
        let err = session
            .start(StartRequest {
                sample_period_ms: 1,
                average_count: 10,
                output_dir: std::path::Path::new("/tmp"),
                output_file: "x",
            })
            .unwrap_err();
        assert_eq!(err.as_label(), "device_start");
        assert!(!drv.is_acquiring());

        drv.fail(Op::Open);
        assert!(matches!(
            Session::open(&drv, 1, 0),
            Err(DeviceError::Open { bus: 1, device: 0, .. })
        ));
    }
}
