// Licensed under the Apache-2.0 license

//! Transaction state machine for the GD32 I2C controllers.
//!
//! One [`I2cController`] owns one peripheral instance. The calling thread
//! validates and plans a message list, takes the bus mutex and runs each
//! group: wait for an idle bus, hand an [`ActiveTransfer`] to interrupt
//! context, sleep on the completion semaphore, and read back the immutable
//! [`GroupOutcome`] once it fires. The board wires the peripheral's event and
//! error vectors to [`I2cController::on_event_interrupt`] and
//! [`I2cController::on_error_interrupt`], and the DMA completion callback to
//! [`I2cController::on_dma_complete`].
//!
//! While a target is registered and no controller transfer is running, the
//! same interrupt entry points drive the target listener instead.

use crate::common::{Logger, NoOpLogger};
use crate::dma::{DmaError, DmaService, NoDma};
use crate::i2c::common::{AddressWidth, I2cConfig, I2cSpeed, I2cXferMode, NackRetry, SlaveStatus};
use crate::i2c::dma::DmaChannels;
use crate::i2c::error::{BusErrors, Error};
use crate::i2c::hardware_instantiation::DummyI2CTarget;
use crate::i2c::message::{plan_groups, Direction, GroupPlan, Message, TargetAddress, MAX_MESSAGES};
use crate::i2c::target::{TargetCallbacks, TargetConfig, TargetSession, TargetSlot};
use crate::i2c::traits::{I2cMasterOps, I2cTargetOps};
use crate::i2c::transfer::{ActiveTransfer, GroupOutcome, Progress, XferPath};
use crate::sync::{Semaphore, SemaphoreGuard};
use core::cell::{Cell, RefCell};
use critical_section::Mutex;
use embedded_hal::i2c::{Operation, SevenBitAddress, TenBitAddress};
use fugit::MillisDurationU32;
use proposed_traits::i2c_target::I2CCoreTarget;

/// Per-call overrides of the controller defaults.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Retry a write group once if it is not acknowledged. `None` follows
    /// the configured [`NackRetry`] policy.
    pub retry_on_nack: Option<bool>,
    /// `None` uses the configured address width.
    pub address_width: Option<AddressWidth>,
}

impl TransferOptions {
    #[must_use]
    pub fn retry_on_nack(mut self, retry: bool) -> Self {
        self.retry_on_nack = Some(retry);
        self
    }

    #[must_use]
    pub fn address_width(mut self, width: AddressWidth) -> Self {
        self.address_width = Some(width);
        self
    }
}

#[derive(Copy, Clone, Debug)]
struct Settings {
    speed: I2cSpeed,
    address_width: AddressWidth,
    source_clock_hz: u32,
    dma_enabled: bool,
    dma_threshold: usize,
    dma_timeout: MillisDurationU32,
    idle_spin_budget: u32,
    recovery_poll_budget: u32,
    nack_retry: NackRetry,
    /// The last transfer ended without releasing the bus.
    bus_held: bool,
}

/// Bytes moved by DMA completions in the running group.
#[derive(Copy, Clone, Debug, Default)]
struct DmaCounts {
    tx: usize,
    rx: usize,
}

impl DmaCounts {
    fn add(&mut self, direction: Direction, bytes: usize) -> usize {
        let count = match direction {
            Direction::Write => &mut self.tx,
            Direction::Read => &mut self.rx,
        };
        *count += bytes;
        *count
    }
}

struct Shared<T> {
    xfer: Option<ActiveTransfer>,
    outcome: Option<GroupOutcome>,
    master_active: bool,
    target: Option<TargetSlot<T>>,
    dma_counts: DmaCounts,
}

/// How a group that did not fail left the bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum GroupEnd {
    Done,
    /// A DMA timeout aborted a group entered by repeated start; the groups
    /// before it in the chain must run again.
    ChainLost,
}

#[derive(Copy, Clone, Debug)]
struct GroupPolicy {
    retry_on_nack: bool,
    allow_dma: bool,
}

enum DmaAttempt {
    Finished(GroupOutcome),
    /// Nothing reached the bus.
    StartFailed,
    /// The group was torn down after the completion wait expired.
    TimedOut,
}

pub struct I2cController<H, S, D = NoDma, T = DummyI2CTarget, L = NoOpLogger>
where
    H: I2cMasterOps + I2cTargetOps,
    S: Semaphore,
    D: DmaService,
    T: TargetCallbacks,
    L: Logger,
{
    hardware: H,
    bus_mutex: S,
    sync: S,
    dma: Option<DmaChannels<D>>,
    settings: Mutex<Cell<Settings>>,
    shared: Mutex<RefCell<Shared<T>>>,
    logger: L,
}

impl<H, S, D, T, L> I2cController<H, S, D, T, L>
where
    H: I2cMasterOps + I2cTargetOps,
    S: Semaphore,
    D: DmaService,
    T: TargetCallbacks,
    L: Logger,
{
    /// Build a controller around `hardware`. No register is touched until
    /// [`configure`](Self::configure).
    ///
    /// `bus_mutex` is primed with one unit and `sync` is drained.
    pub fn new(
        hardware: H,
        bus_mutex: S,
        sync: S,
        config: &I2cConfig,
        source_clock_hz: u32,
        logger: L,
    ) -> Self {
        bus_mutex.reset();
        bus_mutex.give();
        sync.reset();
        let settings = Settings {
            speed: config.speed,
            address_width: config.address_width,
            source_clock_hz,
            dma_enabled: config.xfer_mode == I2cXferMode::DmaMode,
            dma_threshold: config.dma_threshold,
            dma_timeout: config.dma_timeout,
            idle_spin_budget: config.idle_spin_budget,
            recovery_poll_budget: config.recovery_poll_budget,
            nack_retry: config.nack_retry,
            bus_held: false,
        };
        Self {
            hardware,
            bus_mutex,
            sync,
            dma: None,
            settings: Mutex::new(Cell::new(settings)),
            shared: Mutex::new(RefCell::new(Shared {
                xfer: None,
                outcome: None,
                master_active: false,
                target: None,
                dma_counts: DmaCounts::default(),
            })),
            logger,
        }
    }

    /// Bind a TX/RX channel pair.
    #[must_use]
    pub fn with_dma(mut self, channels: DmaChannels<D>) -> Self {
        self.dma = Some(channels);
        self
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Claim the bound DMA channels, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dma`] if the DMA service refuses a channel.
    pub fn request_dma_channels(&self) -> Result<(), Error> {
        if let Some(dma) = &self.dma {
            dma.request_channels()?;
        }
        Ok(())
    }

    /// Record the peripheral source clock used by the next
    /// [`configure`](Self::configure).
    pub fn set_source_clock(&self, hz: u32) {
        self.update_settings(|s| s.source_clock_hz = hz);
    }

    pub fn set_dma_enabled(&self, enabled: bool) {
        self.update_settings(|s| s.dma_enabled = enabled);
    }

    #[must_use]
    pub fn dma_enabled(&self) -> bool {
        self.dma.is_some() && self.settings().dma_enabled
    }

    /// Program SCL timing for `speed` and set the default address width.
    ///
    /// # Arguments
    ///
    /// * `speed` - Bus speed class
    /// * `address_width` - Address width used when a transfer does not
    ///   override it
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSpeed`] or [`Error::ClockOutOfRange`] if
    /// the instance cannot derive timing for `speed` from its source clock.
    /// The previous configuration stays in effect.
    pub fn configure(&self, speed: I2cSpeed, address_width: AddressWidth) -> Result<(), Error> {
        let _bus = SemaphoreGuard::acquire(&self.bus_mutex);
        let settings = self.settings();
        if let Err(e) = self.hardware.configure_timing(speed, settings.source_clock_hz) {
            self.logger.error(format_args!(
                "i2c: cannot run {} Hz from a {} Hz source clock: {:?}",
                speed.bitrate(),
                settings.source_clock_hz,
                e
            ));
            return Err(e);
        }
        self.update_settings(|s| {
            s.speed = speed;
            s.address_width = address_width;
            s.bus_held = false;
        });
        // Timing writes leave the peripheral off; a listener needs it back.
        critical_section::with(|cs| {
            if let Some(slot) = self.shared.borrow_ref(cs).target.as_ref() {
                self.hardware.enter_target_mode(slot.session.address);
            }
        });
        Ok(())
    }

    /// Run `msgs` against the device at `address` with the configured
    /// defaults.
    ///
    /// # Errors
    ///
    /// See [`transfer_with`](Self::transfer_with).
    pub fn transfer(&self, msgs: &mut [Message<'_>], address: u16) -> Result<(), Error> {
        self.transfer_with(msgs, address, TransferOptions::default())
    }

    /// Run `msgs` against the device at `address`.
    ///
    /// Adjacent messages in the same direction go out as one bus group.
    /// Groups run in order; the first failing group ends the call and the
    /// remaining messages are left untouched.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] - malformed list or address; nothing was
    ///   written to the peripheral
    /// * [`Error::Io`] - a group failed on the bus
    /// * [`Error::Busy`] - the bus stayed busy and recovery failed
    pub fn transfer_with(
        &self,
        msgs: &mut [Message<'_>],
        address: u16,
        options: TransferOptions,
    ) -> Result<(), Error> {
        if msgs.is_empty() {
            return Ok(());
        }
        let plan = plan_groups(msgs)?;
        let defaults = self.settings();
        let width = options.address_width.unwrap_or(defaults.address_width);
        let target = TargetAddress::new(address, width)?;
        let retry = options
            .retry_on_nack
            .unwrap_or_else(|| defaults.nack_retry.applies_to(address));

        let _bus = SemaphoreGuard::acquire(&self.bus_mutex);
        let settings = self.settings();
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).master_active = true);

        let mut held = settings.bus_held;
        let mut policy = GroupPolicy {
            retry_on_nack: retry,
            allow_dma: true,
        };
        // First group of the open repeated-start chain, unless an earlier
        // call opened it.
        let mut chain_start = None;
        let mut index = 0;
        let mut result = Ok(());
        while let Some(group) = plan.get(index) {
            if !held {
                chain_start = Some(index);
            }
            match self.run_group(msgs, group, target, held, policy, &settings) {
                Ok(GroupEnd::Done) => {
                    held = self.hardware.holds_bus_after(group.direction, group.has_stop);
                    self.end_group(held, &settings);
                    index += 1;
                }
                Ok(GroupEnd::ChainLost) => {
                    held = false;
                    self.end_group(held, &settings);
                    let Some(start) = chain_start else {
                        self.logger.error(format_args!(
                            "i2c: dma timed out in a chain opened by an earlier call"
                        ));
                        result = Err(Error::Timeout);
                        break;
                    };
                    self.logger.warn(format_args!(
                        "i2c: dma timed out after a repeated start, replaying from group {}",
                        start
                    ));
                    policy.allow_dma = false;
                    index = start;
                }
                Err(e) => {
                    held = false;
                    self.end_group(held, &settings);
                    result = Err(e);
                    break;
                }
            }
        }
        self.finish(held);
        result
    }

    fn run_group(
        &self,
        msgs: &mut [Message<'_>],
        group: &GroupPlan,
        address: TargetAddress,
        restart: bool,
        policy: GroupPolicy,
        settings: &Settings,
    ) -> Result<GroupEnd, Error> {
        let result = self.attempt_group(msgs, group, address, restart, policy, settings);
        match result {
            Err(Error::Io(errors))
                if policy.retry_on_nack
                    && group.direction == Direction::Write
                    && errors.contains(BusErrors::NO_ACKNOWLEDGE) =>
            {
                // The stop forced by the NACK released the bus.
                self.logger.debug(format_args!(
                    "i2c: {:?} not acknowledged, retrying write once",
                    address
                ));
                self.attempt_group(msgs, group, address, false, policy, settings)
            }
            other => other,
        }
    }

    fn attempt_group(
        &self,
        msgs: &mut [Message<'_>],
        group: &GroupPlan,
        address: TargetAddress,
        mut restart: bool,
        policy: GroupPolicy,
        settings: &Settings,
    ) -> Result<GroupEnd, Error> {
        if !restart {
            self.wait_idle(settings)?;
        }

        let dma = self.dma_for(settings, group).filter(|_| policy.allow_dma);
        if let Some(dma) = dma {
            let xfer = ActiveTransfer::new(msgs, group, address, XferPath::Dma, restart);
            if xfer.within(dma.window()) {
                match self.run_dma_group(dma, xfer, settings) {
                    DmaAttempt::Finished(outcome) => {
                        return self.conclude(group, outcome).map(|()| GroupEnd::Done);
                    }
                    DmaAttempt::StartFailed => {
                        self.logger.warn(format_args!(
                            "i2c: dma start failed, using interrupt mode"
                        ));
                    }
                    // The abort sent a stop, so the earlier groups of the
                    // chain no longer address the device.
                    DmaAttempt::TimedOut if restart => return Ok(GroupEnd::ChainLost),
                    DmaAttempt::TimedOut => {
                        self.logger.warn(format_args!("i2c: dma timed out, using interrupt mode"));
                        restart = false;
                        self.wait_idle(settings)?;
                    }
                }
            }
        }

        let xfer = ActiveTransfer::new(msgs, group, address, XferPath::Interrupt, restart);
        let outcome = self.run_irq_group(xfer);
        self.conclude(group, outcome).map(|()| GroupEnd::Done)
    }

    fn dma_for(&self, settings: &Settings, group: &GroupPlan) -> Option<&DmaChannels<D>> {
        self.dma
            .as_ref()
            .filter(|_| settings.dma_enabled && group.len >= settings.dma_threshold)
    }

    fn run_dma_group(
        &self,
        dma: &DmaChannels<D>,
        xfer: ActiveTransfer,
        settings: &Settings,
    ) -> DmaAttempt {
        let direction = xfer.direction();
        let Some((memory, len, last)) = xfer.dma_segment() else {
            return DmaAttempt::StartFailed;
        };
        self.sync.reset();

        let started = critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            shared.outcome = None;
            shared.dma_counts = DmaCounts::default();
            self.hardware.prepare_dma(direction, len, last);
            let data_register = self.hardware.data_register(direction);
            if let Err(e) = dma.start_segment(direction, memory, len, data_register) {
                self.logger
                    .error(format_args!("i2c: dma start ({:?}) failed: {:?}", direction, e));
                self.hardware.disable_interrupts();
                return false;
            }
            let xfer = shared.xfer.insert(xfer);
            self.hardware.begin(xfer);
            true
        });
        if !started {
            return DmaAttempt::StartFailed;
        }

        if self.sync.take(Some(settings.dma_timeout)).is_ok() {
            let outcome =
                critical_section::with(|cs| self.shared.borrow_ref_mut(cs).outcome.take());
            return DmaAttempt::Finished(outcome.unwrap_or(GroupOutcome {
                errors: BusErrors::BUS_ERROR,
                transferred: 0,
            }));
        }

        let late = critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            if shared.xfer.take().is_some() {
                let halted = dma.halt(direction, settings.idle_spin_budget);
                self.hardware.abort();
                if let Err(e) = halted {
                    self.logger.error(format_args!(
                        "i2c: dma ({:?}) did not stop: {:?}",
                        direction, e
                    ));
                    return Some(GroupOutcome {
                        errors: BusErrors::BUS_ERROR,
                        transferred: 0,
                    });
                }
            }
            shared.outcome.take()
        });
        self.sync.reset();
        match late {
            // Completed between the timeout and the teardown.
            Some(outcome) => DmaAttempt::Finished(outcome),
            None => DmaAttempt::TimedOut,
        }
    }

    fn run_irq_group(&self, xfer: ActiveTransfer) -> GroupOutcome {
        self.sync.reset();
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            shared.outcome = None;
            let xfer = shared.xfer.insert(xfer);
            self.hardware.begin(xfer);
        });
        while self.sync.take(None).is_err() {}
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).outcome.take()).unwrap_or(
            GroupOutcome {
                errors: BusErrors::BUS_ERROR,
                transferred: 0,
            },
        )
    }

    fn conclude(&self, group: &GroupPlan, outcome: GroupOutcome) -> Result<(), Error> {
        let mut errors = outcome.errors;
        if errors.is_empty() && outcome.transferred != group.len {
            errors |= BusErrors::OVERFLOW;
        }
        if errors.is_empty() {
            return Ok(());
        }
        for (name, _) in errors.iter_names() {
            self.logger.error(format_args!(
                "i2c: group of {} bytes failed after {}: {}",
                group.len, outcome.transferred, name
            ));
        }
        Err(Error::Io(errors))
    }

    /// Wait for an idle bus, recovering a stuck one.
    fn wait_idle(&self, settings: &Settings) -> Result<(), Error> {
        if (0..settings.idle_spin_budget).any(|_| !self.hardware.is_busy()) {
            return Ok(());
        }
        self.logger.warn(format_args!("i2c: bus stuck busy, recovering"));
        if self.hardware.recover(settings.recovery_poll_budget) {
            self.logger.info(format_args!("i2c: bus recovered"));
            Ok(())
        } else {
            self.logger.error(format_args!("i2c: bus recovery failed"));
            Err(Error::Busy)
        }
    }

    fn end_group(&self, held: bool, settings: &Settings) {
        self.hardware.disable_interrupts();
        if !held && !(0..settings.idle_spin_budget).any(|_| !self.hardware.is_busy()) {
            self.logger.warn(format_args!("i2c: bus still busy after stop"));
        }
    }

    fn finish(&self, held: bool) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            shared.xfer = None;
            shared.master_active = false;
            if !held {
                match shared.target.as_ref() {
                    Some(slot) => self.hardware.enter_target_mode(slot.session.address),
                    None => self.hardware.disable(),
                }
            }
        });
        self.update_settings(|s| s.bus_held = held);
    }

    /// Event interrupt entry point.
    pub fn on_event_interrupt(&self) {
        critical_section::with(|cs| {
            let mut guard = self.shared.borrow_ref_mut(cs);
            let shared = &mut *guard;
            if shared.master_active {
                let progress = match shared.xfer.as_mut() {
                    Some(xfer) => self.hardware.service_event(xfer),
                    None => {
                        self.hardware.disable_interrupts();
                        return;
                    }
                };
                self.settle(shared, progress);
            } else if let Some(slot) = shared.target.as_mut() {
                let _ = self
                    .hardware
                    .service_target(&mut slot.target, &mut slot.session);
            } else {
                self.hardware.disable_interrupts();
            }
        });
    }

    /// Error interrupt entry point.
    pub fn on_error_interrupt(&self) {
        critical_section::with(|cs| {
            let mut guard = self.shared.borrow_ref_mut(cs);
            let shared = &mut *guard;
            if shared.master_active {
                let progress = match shared.xfer.as_mut() {
                    Some(xfer) => self.hardware.service_error(xfer),
                    None => {
                        self.hardware.disable_interrupts();
                        return;
                    }
                };
                self.settle(shared, progress);
            } else if let Some(slot) = shared.target.as_mut() {
                if self.hardware.service_target_error(&mut slot.session) {
                    self.logger.warn(format_args!(
                        "i2c: bus error while listening at {:#04x}",
                        slot.session.address
                    ));
                }
            } else {
                self.hardware.disable_interrupts();
            }
        });
    }

    /// DMA completion callback for either bound channel.
    ///
    /// Completions for a channel that does not serve the running group are
    /// ignored.
    pub fn on_dma_complete(&self, channel: u32, status: Result<(), DmaError>) {
        let Some(dma) = self.dma.as_ref() else {
            return;
        };
        let Some(direction) = dma.direction_of(channel) else {
            return;
        };
        critical_section::with(|cs| {
            let mut guard = self.shared.borrow_ref_mut(cs);
            let shared = &mut *guard;
            let Some(xfer) = shared.xfer.as_mut() else {
                return;
            };
            if xfer.path() != XferPath::Dma || xfer.direction() != direction {
                return;
            }

            let progress = match status {
                Err(e) => {
                    self.logger
                        .error(format_args!("i2c: dma channel {} failed: {:?}", channel, e));
                    xfer.flag(BusErrors::BUS_ERROR);
                    self.hardware.abort();
                    Progress::Failed
                }
                Ok(()) => {
                    let moved = xfer.complete_dma_segment();
                    if shared.dma_counts.add(direction, moved) >= xfer.total() {
                        self.hardware.dma_finished(xfer)
                    } else if let Some((memory, len, last)) = xfer.dma_segment() {
                        self.hardware.prepare_dma(direction, len, last);
                        let data_register = self.hardware.data_register(direction);
                        match dma.start_segment(direction, memory, len, data_register) {
                            Ok(()) => Progress::Pending,
                            Err(e) => {
                                self.logger.error(format_args!(
                                    "i2c: dma re-arm failed: {:?}",
                                    e
                                ));
                                xfer.flag(BusErrors::BUS_ERROR);
                                self.hardware.abort();
                                Progress::Failed
                            }
                        }
                    } else {
                        xfer.flag(BusErrors::OVERFLOW);
                        self.hardware.abort();
                        Progress::Failed
                    }
                }
            };
            self.settle(shared, progress);
        });
    }

    /// Retire the running group once it stops being pending: publish its
    /// outcome and wake the owning thread.
    fn settle(&self, shared: &mut Shared<T>, progress: Progress) {
        if progress == Progress::Pending {
            return;
        }
        if let Some(mut xfer) = shared.xfer.take() {
            if xfer.path() == XferPath::Dma {
                if let Some(dma) = self.dma.as_ref() {
                    let direction = xfer.direction();
                    if let Err(e) = dma.halt(direction, self.settings().idle_spin_budget) {
                        self.logger.error(format_args!(
                            "i2c: dma ({:?}) did not stop: {:?}",
                            direction, e
                        ));
                        xfer.flag(BusErrors::BUS_ERROR);
                    }
                }
            }
            shared.outcome = Some(xfer.outcome());
            self.sync.give();
        }
    }

    /// Listen at `config`'s address and route remote controller traffic to
    /// `target`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] - 10-bit or out of range address, or the
    ///   target refused initialisation
    /// * [`Error::Busy`] - a target is already registered
    pub fn target_register(&self, config: TargetConfig, mut target: T) -> Result<(), Error> {
        let address = config.seven_bit_address()?;
        let _bus = SemaphoreGuard::acquire(&self.bus_mutex);
        if critical_section::with(|cs| self.shared.borrow_ref(cs).target.is_some()) {
            return Err(Error::Busy);
        }
        target.init(address).map_err(|_| Error::InvalidArgument)?;
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            self.hardware.enter_target_mode(address);
            shared.target = Some(TargetSlot {
                target,
                session: TargetSession::new(address),
            });
        });
        self.update_settings(|s| s.bus_held = false);
        self.logger
            .info(format_args!("i2c: target registered at {:#04x}", address));
        Ok(())
    }

    /// Stop listening and hand the registered target back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if no target is registered at
    /// `address`.
    pub fn target_unregister(&self, address: u8) -> Result<T, Error> {
        let _bus = SemaphoreGuard::acquire(&self.bus_mutex);
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            match shared.target.take() {
                Some(slot) if slot.session.address == address => {
                    self.hardware.leave_target_mode();
                    Ok(slot.target)
                }
                other => {
                    shared.target = other;
                    Err(Error::InvalidArgument)
                }
            }
        })
    }

    #[must_use]
    pub fn target_status(&self) -> Option<SlaveStatus> {
        critical_section::with(|cs| {
            self.shared
                .borrow_ref(cs)
                .target
                .as_ref()
                .map(|slot| slot.session.status())
        })
    }

    fn run_operations(
        &self,
        address: u16,
        width: AddressWidth,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let count = operations.len();
        let mut msgs: heapless::Vec<Message<'_>, MAX_MESSAGES> = heapless::Vec::new();
        let mut previous = None;
        for (index, op) in operations.iter_mut().enumerate() {
            let mut msg = match op {
                Operation::Read(buffer) => Message::read(buffer),
                Operation::Write(bytes) => Message::write(bytes),
            };
            if previous.is_some_and(|d| d != msg.direction()) {
                msg = msg.with_restart();
            }
            previous = Some(msg.direction());
            if index + 1 == count {
                msg = msg.with_stop();
            }
            msgs.push(msg).map_err(|_| Error::InvalidArgument)?;
        }
        self.transfer_with(
            &mut msgs,
            address,
            TransferOptions::default().address_width(width),
        )
    }

    fn settings(&self) -> Settings {
        critical_section::with(|cs| self.settings.borrow(cs).get())
    }

    fn update_settings(&self, f: impl FnOnce(&mut Settings)) {
        critical_section::with(|cs| {
            let cell = self.settings.borrow(cs);
            let mut settings = cell.get();
            f(&mut settings);
            cell.set(settings);
        });
    }
}

impl<H, S, D, T, L> embedded_hal::i2c::ErrorType for I2cController<H, S, D, T, L>
where
    H: I2cMasterOps + I2cTargetOps,
    S: Semaphore,
    D: DmaService,
    T: TargetCallbacks,
    L: Logger,
{
    type Error = Error;
}

impl<H, S, D, T, L> embedded_hal::i2c::I2c<SevenBitAddress> for I2cController<H, S, D, T, L>
where
    H: I2cMasterOps + I2cTargetOps,
    S: Semaphore,
    D: DmaService,
    T: TargetCallbacks,
    L: Logger,
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.run_operations(u16::from(address), AddressWidth::SevenBit, operations)
    }
}

impl<H, S, D, T, L> embedded_hal::i2c::I2c<TenBitAddress> for I2cController<H, S, D, T, L>
where
    H: I2cMasterOps + I2cTargetOps,
    S: Semaphore,
    D: DmaService,
    T: TargetCallbacks,
    L: Logger,
{
    fn transaction(
        &mut self,
        address: TenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.run_operations(address, AddressWidth::TenBit, operations)
    }
}
