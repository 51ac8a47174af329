//! Module that prints colored, leveled messages to the console.

use color_print::{ceprintln, cprintln};
use std::sync::atomic::{AtomicU8, Ordering};

/// Enum that represents how verbose the console output is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

static LEVEL: AtomicU8 = AtomicU8::new(Level::Debug as u8);

/// Function that sets the lowest level that gets printed.
pub fn set_level(level: Level) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Function that returns the lowest level that gets printed.
pub fn level() -> Level {
    match LEVEL.load(Ordering::Relaxed) {
        0 => Level::Debug,
        1 => Level::Info,
        2 => Level::Warn,
        _ => Level::Error,
    }
}

fn enabled(level: Level) -> bool {
    level >= self::level()
}

pub fn debug(message: &str) {
    if enabled(Level::Debug) {
        cprintln!("<dim>[DEBUG]</dim> {message}");
    }
}

pub fn info(message: &str) {
    if enabled(Level::Info) {
        cprintln!("<green, bold>[INFO]</green, bold> {message}");
    }
}

pub fn warn(message: &str) {
    if enabled(Level::Warn) {
        cprintln!("<yellow, bold>[WARN]</yellow, bold> {message}");
    }
}

pub fn error(message: &str) {
    if enabled(Level::Error) {
        ceprintln!("<red, bold>[ERROR]</red, bold> {message}");
    }
}
