// Licensed under the Apache-2.0 license

//! Messages, target addresses and the group planning pass.
//!
//! A transfer is a list of [`Message`]s. Before anything reaches the
//! hardware the list is validated and split into groups: maximal runs of
//! adjacent messages with the same direction that go out as one bus
//! transaction. Both IP back ends consume the same [`GroupPlan`].

use crate::i2c::common::AddressWidth;
use crate::i2c::error::Error;
use bitflags::bitflags;
use heapless::Vec;

/// Longest message list accepted by one transfer.
pub const MAX_MESSAGES: usize = 32;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct MessageFlags: u8 {
        /// Release the bus after this message. Only valid on the last one.
        const STOP = 1 << 1;
        /// Issue a repeated start before this message.
        const RESTART = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

enum Buffer<'a> {
    Write(&'a [u8]),
    Read(&'a mut [u8]),
}

/// One directional segment of a transfer. The buffer stays owned by the
/// caller; the driver only reads or fills it.
pub struct Message<'a> {
    buf: Buffer<'a>,
    flags: MessageFlags,
}

impl<'a> Message<'a> {
    #[must_use]
    pub fn write(bytes: &'a [u8]) -> Self {
        Self {
            buf: Buffer::Write(bytes),
            flags: MessageFlags::empty(),
        }
    }

    #[must_use]
    pub fn read(buffer: &'a mut [u8]) -> Self {
        Self {
            buf: Buffer::Read(buffer),
            flags: MessageFlags::empty(),
        }
    }

    #[must_use]
    pub fn with_stop(mut self) -> Self {
        self.flags |= MessageFlags::STOP;
        self
    }

    #[must_use]
    pub fn with_restart(mut self) -> Self {
        self.flags |= MessageFlags::RESTART;
        self
    }

    #[must_use]
    pub fn flags(&self) -> MessageFlags {
        self.flags
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        match self.buf {
            Buffer::Write(_) => Direction::Write,
            Buffer::Read(_) => Direction::Read,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.buf {
            Buffer::Write(b) => b.len(),
            Buffer::Read(b) => b.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start and length of the buffer. Only read messages may be written
    /// through the returned pointer.
    pub(crate) fn raw_parts(&mut self) -> (*mut u8, usize) {
        match &mut self.buf {
            Buffer::Write(b) => (b.as_ptr().cast_mut(), b.len()),
            Buffer::Read(b) => (b.as_mut_ptr(), b.len()),
        }
    }
}

/// A validated target address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TargetAddress {
    SevenBit(u8),
    TenBit(u16),
}

impl TargetAddress {
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `address` does not fit `width`.
    pub fn new(address: u16, width: AddressWidth) -> Result<Self, Error> {
        match width {
            AddressWidth::SevenBit => u8::try_from(address)
                .ok()
                .filter(|a| *a <= 0x7F)
                .map(TargetAddress::SevenBit)
                .ok_or(Error::InvalidArgument),
            AddressWidth::TenBit if address <= 0x3FF => Ok(TargetAddress::TenBit(address)),
            AddressWidth::TenBit => Err(Error::InvalidArgument),
        }
    }

    /// 10-bit header byte `11110xx0` carrying address bits 9:8.
    #[must_use]
    pub fn header(self) -> u8 {
        match self {
            TargetAddress::SevenBit(a) => a << 1,
            TargetAddress::TenBit(a) => 0xF0 | (((a >> 8) as u8 & 0x03) << 1),
        }
    }

    /// Low eight bits of a 10-bit address.
    #[must_use]
    pub fn low_byte(self) -> u8 {
        match self {
            TargetAddress::SevenBit(a) => a,
            TargetAddress::TenBit(a) => (a & 0xFF) as u8,
        }
    }
}

/// One hardware transaction: a run of messages sharing a direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GroupPlan {
    /// Index of the first message of the group.
    pub first: usize,
    pub count: usize,
    pub direction: Direction,
    /// Sum of the message lengths; the hardware-visible byte count.
    pub len: usize,
    /// The group's last message releases the bus.
    pub has_stop: bool,
}

/// Reject malformed message lists.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if a message is empty, if a direction
/// change lacks a restart marker, if a stop marker sits anywhere but on the
/// last message, or if the list is longer than [`MAX_MESSAGES`].
pub fn validate(msgs: &[Message<'_>]) -> Result<(), Error> {
    if msgs.len() > MAX_MESSAGES {
        return Err(Error::InvalidArgument);
    }
    let last = msgs.len().saturating_sub(1);
    let mut previous: Option<Direction> = None;
    for (i, msg) in msgs.iter().enumerate() {
        if msg.is_empty() {
            return Err(Error::InvalidArgument);
        }
        if msg.flags.contains(MessageFlags::STOP) && i != last {
            return Err(Error::InvalidArgument);
        }
        if let Some(prev) = previous {
            if prev != msg.direction() && !msg.flags.contains(MessageFlags::RESTART) {
                return Err(Error::InvalidArgument);
            }
        }
        previous = Some(msg.direction());
    }
    Ok(())
}

/// Split a validated list into groups.
///
/// A new group starts on a direction change or on an explicit restart
/// marker. The restart marker on the very first message is implied.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the list fails [`validate`].
pub fn plan_groups(msgs: &[Message<'_>]) -> Result<Vec<GroupPlan, MAX_MESSAGES>, Error> {
    validate(msgs)?;
    let mut plans: Vec<GroupPlan, MAX_MESSAGES> = Vec::new();
    for (i, msg) in msgs.iter().enumerate() {
        let has_stop = msg.flags.contains(MessageFlags::STOP);
        let starts_group = msg.flags.contains(MessageFlags::RESTART);
        match plans.last_mut() {
            Some(group) if group.direction == msg.direction() && !starts_group => {
                group.count += 1;
                group.len += msg.len();
                group.has_stop = has_stop;
            }
            _ => plans
                .push(GroupPlan {
                    first: i,
                    count: 1,
                    direction: msg.direction(),
                    len: msg.len(),
                    has_stop,
                })
                .map_err(|_| Error::InvalidArgument)?,
        }
    }
    Ok(plans)
}
