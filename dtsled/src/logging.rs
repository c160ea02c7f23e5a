use core::fmt::Arguments;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, set_logger, set_max_level};
use spin::Once;

/// Where formatted log lines go, e.g. the kernel console or a serial port.
pub type ConsoleSink = fn(Arguments);

static SINK: Once<ConsoleSink> = Once::new();

pub struct Logger;

impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        SINK.is_completed()
    }

    fn log(&self, record: &Record) {
        let Some(sink) = SINK.get() else {
            return;
        };
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 20,  // White
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        sink(format_args!(
            "\u{1B}[{}m[{:}] {}\u{1B}[0m\n",
            color,
            record.level(),
            record.args(),
        ));
    }

    fn flush(&self) {}
}

/// Install the driver logger. Records are dropped until this is called.
pub fn init(sink: ConsoleSink) -> Result<(), SetLoggerError> {
    static LOGGER: Logger = Logger;
    SINK.call_once(|| sink);
    set_logger(&LOGGER)?;
    set_max_level(LevelFilter::Debug);
    Ok(())
}

/// Improved debug macro,
/// only compiled in debug mode.
#[macro_export]
macro_rules! debug_ex {
    // debug_ex!(target: "my_target", "a {} event", "log")
    (target: $target:expr, $($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            use log::{log,Level};
            log!(target: $target, Level::Debug, $($arg)+)
        }
    };

    // debug_ex!("a {} event", "log")
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            use log::{log,Level};
            log!(Level::Debug, $($arg)+)
        }
    }
}
