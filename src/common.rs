// Licensed under the Apache-2.0 license

//! Logging sinks shared by the drivers in this crate.
//!
//! Drivers take a `Logger` type parameter defaulting to [`NoOpLogger`], so a
//! board that does not route logs anywhere pays nothing for them.

use core::fmt::{self, Write as _};

/// Severity attached to each record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Debug => "DBG",
            Level::Info => "INF",
            Level::Warn => "WRN",
            Level::Error => "ERR",
        }
    }
}

/// Minimal structured logging interface.
///
/// Methods take `&self` because drivers log from interrupt handlers as well
/// as from the thread that owns the transfer.
pub trait Logger {
    fn log(&self, level: Level, args: fmt::Arguments<'_>);

    fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

/// Discards every record.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Writes records to a serial port (or anything else speaking `embedded_io`).
///
/// The writer sits behind a critical section so the logger can be shared with
/// interrupt context. Records below `min_level` are dropped.
pub struct SerialLogger<W> {
    writer: critical_section::Mutex<core::cell::RefCell<W>>,
    min_level: Level,
}

impl<W: embedded_io::Write> SerialLogger<W> {
    pub fn new(writer: W, min_level: Level) -> Self {
        Self {
            writer: critical_section::Mutex::new(core::cell::RefCell::new(writer)),
            min_level,
        }
    }

    /// Give the writer back, e.g. to reuse the UART for something else.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().into_inner()
    }
}

impl<W: embedded_io::Write> Logger for SerialLogger<W> {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if level < self.min_level {
            return;
        }
        critical_section::with(|cs| {
            let mut writer = self.writer.borrow_ref_mut(cs);
            let mut adapter = FmtAdapter(&mut *writer);
            // A failing log sink must never take the driver down with it.
            let _ = write!(adapter, "[{}] {}\r\n", level.tag(), args);
        });
    }
}

struct FmtAdapter<'a, W>(&'a mut W);

impl<W: embedded_io::Write> fmt::Write for FmtAdapter<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
