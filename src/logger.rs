use eyre::{Result, eyre};
use slog::Drain;
use slog_atomic::{AtomicSwitch, AtomicSwitchCtrl};
use slog_term::{CompactFormat, TermDecorator};
use std::io;
use std::sync::Mutex;
use time::OffsetDateTime;

use slog::*;

use crate::helpers::datetime::Timezone;

/// Terminal logger whose level can be switched at runtime, `log` macros
/// are routed here once [`Logger::set_global`] is called
pub struct Logger {
    pub log_level: Mutex<u8>,
    logger: Mutex<Option<slog::Logger>>,
    ctrl: Mutex<Option<AtomicSwitchCtrl>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            log_level: Mutex::new(3),
            logger: Mutex::new(None),
            ctrl: Mutex::new(None),
        }
    }
}

fn new_drain(level: Level) -> Fuse<Mutex<Fuse<LevelFilter<CompactFormat<TermDecorator>>>>> {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::CompactFormat::new(decorator)
        .use_custom_timestamp(|w: &mut dyn io::Write| {
            write!(
                w,
                "{}",
                OffsetDateTime::now_utc()
                    .to_localtime()
                    .to_formatted_string()
            )
        })
        .build()
        .filter_level(level)
        .fuse();
    Mutex::new(drain).fuse()
}

pub fn level_from_u8(log_level: u8) -> Level {
    match log_level {
        0 => Level::Critical,
        1 => Level::Error,
        2 => Level::Warning,
        3 => Level::Info,
        4 => Level::Debug,
        _ => Level::Trace,
    }
}

fn drain_from_log_level(log_level: u8) -> AtomicSwitch {
    AtomicSwitch::new(new_drain(level_from_u8(log_level)))
}

impl Logger {
    pub fn new(log_level: u8) -> Self {
        let drain = drain_from_log_level(log_level);
        let logger = slog::Logger::root(
            drain.clone(),
            slog::o!("version" => env!("CARGO_PKG_VERSION")),
        );
        Logger {
            log_level: Mutex::new(log_level),
            logger: Mutex::new(Some(logger)),
            ctrl: Mutex::new(Some(drain.ctrl())),
        }
    }

    pub fn set_global(&self) -> Result<&Self> {
        let logger = self
            .logger
            .lock()
            .map_err(|e| eyre!("{}", e))?
            .clone()
            .ok_or_else(|| eyre!("logger is not initialized"))?;
        // slog_stdlog uses the logger from slog_scope, so set a logger there
        let guard = slog_scope::set_global_logger(logger);
        // https://github.com/slog-rs/slog/issues/249
        guard.cancel_reset();
        slog_stdlog::init_with_level(log::Level::Trace)?;
        Ok(self)
    }

    /// Swaps the drain in place, loggers handed out earlier follow the change
    pub fn set_log_level(&self, log_level: u8) -> Result<&Self> {
        let ctrl = self.ctrl.lock().map_err(|e| eyre!("{}", e))?;
        let ctrl = ctrl
            .as_ref()
            .ok_or_else(|| eyre!("logger is not initialized"))?;
        ctrl.set(drain_from_log_level(log_level));
        *self.log_level.lock().map_err(|e| eyre!("{}", e))? = log_level;
        Ok(self)
    }
}
