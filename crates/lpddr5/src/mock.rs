//! Recording hardware for host-side testing.
//!
//! [`MockHardware`] implements [`MrcHardware`] without any controller behind
//! it. Every write and delay is logged in order so tests can assert on the
//! exact command stream, and a failure can be injected at the n-th write.
//! Storage is `heapless`, so the mock also links into `no_std` test images.

use embedded_hal::delay::DelayNs;

use crate::hal::{MrcHardware, RankScope, RegisterId};

/// Writes retained by the log.
pub const MOCK_WRITE_CAPACITY: usize = 512;

/// Events (writes and delays) retained by the log.
pub const MOCK_EVENT_CAPACITY: usize = 1024;

const MOCK_READ_SLOTS: usize = 16;

/// A recorded register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockWrite {
    /// Target.
    pub scope: RankScope,
    /// Register or command.
    pub register: RegisterId,
    /// Written value.
    pub value: u32,
}

impl MockWrite {
    /// MR number if this write is a mode-register write.
    #[must_use]
    pub fn mode_register(&self) -> Option<u8> {
        match self.register {
            RegisterId::ModeRegister(mr) => Some(mr),
            _ => None,
        }
    }
}

/// One entry of the ordered event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    /// Register write.
    Write(MockWrite),
    /// `DelayNs` call, in nanoseconds.
    Delay(u32),
}

/// Failures the mock can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    /// Write failed on request of [`MockHardware::fail_on_write`].
    InjectedWriteFailure,
    /// Read failed on request of [`MockHardware::fail_reads`].
    InjectedReadFailure,
    /// The write log is full.
    LogFull,
}

/// Mock memory controller; records all calls for test assertions.
#[derive(Debug, Default)]
pub struct MockHardware {
    writes: heapless::Vec<MockWrite, MOCK_WRITE_CAPACITY>,
    events: heapless::Vec<MockEvent, MOCK_EVENT_CAPACITY>,
    reads: heapless::Vec<(RankScope, RegisterId, u32), MOCK_READ_SLOTS>,
    read_count: usize,
    fail_write_at: Option<usize>,
    fail_reads: bool,
    total_delay_ns: u64,
}

impl MockHardware {
    /// Empty log, all reads return 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next write attempted once `n` writes have been recorded.
    /// The failure fires once.
    pub fn fail_on_write(&mut self, n: usize) {
        self.fail_write_at = Some(n);
    }

    /// Fail every read.
    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Value returned when `register` is read on `scope`.
    ///
    /// # Errors
    ///
    /// [`MockError::LogFull`] once the read table is full.
    pub fn set_read(&mut self, scope: RankScope, register: RegisterId, value: u32) -> Result<(), MockError> {
        if let Some(entry) = self.reads.iter_mut().find(|(s, r, _)| *s == scope && *r == register) {
            entry.2 = value;
            return Ok(());
        }
        self.reads
            .push((scope, register, value))
            .map_err(|_| MockError::LogFull)
    }

    /// Recorded writes, oldest first.
    pub fn writes(&self) -> &[MockWrite] {
        &self.writes
    }

    /// Recorded writes and delays, oldest first.
    pub fn events(&self) -> &[MockEvent] {
        &self.events
    }

    /// Number of reads served.
    pub fn read_count(&self) -> usize {
        self.read_count
    }

    /// Sum of all delays in nanoseconds.
    pub fn total_delay_ns(&self) -> u64 {
        self.total_delay_ns
    }

    /// Mode-register writes as `(scope, mr, value)`, oldest first.
    pub fn mode_register_writes(&self) -> impl Iterator<Item = (RankScope, u8, u32)> + '_ {
        self.writes
            .iter()
            .filter_map(|w| w.mode_register().map(|mr| (w.scope, mr, w.value)))
    }

    /// Forget all recorded traffic and injected failures.
    pub fn clear(&mut self) {
        self.writes.clear();
        self.events.clear();
        self.read_count = 0;
        self.fail_write_at = None;
        self.fail_reads = false;
        self.total_delay_ns = 0;
    }
}

impl DelayNs for MockHardware {
    fn delay_ns(&mut self, ns: u32) {
        self.total_delay_ns = self.total_delay_ns.saturating_add(u64::from(ns));
        let _ = self.events.push(MockEvent::Delay(ns));
    }
}

impl MrcHardware for MockHardware {
    type Error = MockError;

    fn read_register(&mut self, scope: RankScope, register: RegisterId) -> Result<u32, Self::Error> {
        if self.fail_reads {
            return Err(MockError::InjectedReadFailure);
        }
        self.read_count = self.read_count.saturating_add(1);
        Ok(self
            .reads
            .iter()
            .find(|(s, r, _)| *s == scope && *r == register)
            .map_or(0, |(_, _, v)| *v))
    }

    fn write_register(&mut self, scope: RankScope, register: RegisterId, value: u32) -> Result<(), Self::Error> {
        if self.fail_write_at == Some(self.writes.len()) {
            // One-shot: the next write goes through.
            self.fail_write_at = None;
            return Err(MockError::InjectedWriteFailure);
        }
        let write = MockWrite { scope, register, value };
        self.writes.push(write).map_err(|_| MockError::LogFull)?;
        let _ = self.events.push(MockEvent::Write(write));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RANK0: RankScope = RankScope::Rank { controller: 0, channel: 0, rank: 0 };

    #[test]
    fn records_writes_and_delays_in_order() {
        let mut hw = MockHardware::new();
        hw.write_register(RANK0, RegisterId::ModeRegister(16), 0x01).unwrap();
        hw.delay_ns(150);
        hw.write_register(RANK0, RegisterId::Mpc, 0x81).unwrap();
        assert_eq!(hw.writes().len(), 2);
        assert_eq!(hw.events().get(1), Some(&MockEvent::Delay(150)));
        assert_eq!(hw.total_delay_ns(), 150);
        assert_eq!(hw.writes().first().unwrap().mode_register(), Some(16));
        assert_eq!(hw.writes().get(1).unwrap().mode_register(), None);
    }

    #[test]
    fn injected_failure_hits_nth_write_once() {
        let mut hw = MockHardware::new();
        hw.fail_on_write(1);
        hw.write_register(RANK0, RegisterId::Mpc, 1).unwrap();
        assert_eq!(hw.write_register(RANK0, RegisterId::Mpc, 2), Err(MockError::InjectedWriteFailure));
        hw.write_register(RANK0, RegisterId::Mpc, 3).unwrap();
        assert_eq!(hw.writes().len(), 2);
    }

    #[test]
    fn configured_reads() {
        let mut hw = MockHardware::new();
        assert_eq!(hw.read_register(RANK0, RegisterId::ModeRegister(25)).unwrap(), 0);
        hw.set_read(RANK0, RegisterId::ModeRegister(25), 0xFF).unwrap();
        assert_eq!(hw.read_register(RANK0, RegisterId::ModeRegister(25)).unwrap(), 0xFF);
        hw.fail_reads(true);
        assert_eq!(
            hw.read_register(RANK0, RegisterId::ModeRegister(25)),
            Err(MockError::InjectedReadFailure)
        );
        assert_eq!(hw.read_count(), 2);
    }
}
