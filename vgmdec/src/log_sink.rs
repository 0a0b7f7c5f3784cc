// vgmdec
// Copyright (c) 2026 The vgmdec Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Routes this crate's (and its dependencies') [`log`] records to a host-supplied callback instead
//! of whatever global logger, if any, the host process has already installed. Every meta and codec
//! crate in this workspace logs through the `log` facade; this module is what lets a host that
//! embeds `vgmdec` without a logging framework of its own still see those records, without forcing
//! one on a host that already has `env_logger` or similar wired up.

use std::sync::Mutex;

/// A host-supplied log sink and the level it should receive records at.
pub struct LogConfig {
    pub level: log::LevelFilter,
    pub callback: Box<dyn Fn(log::Level, &str) + Send + Sync>,
}

static LOG_FILTER: Mutex<log::LevelFilter> = Mutex::new(log::LevelFilter::Warn);
static LOG_CALLBACK: Mutex<Option<Box<dyn Fn(log::Level, &str) + Send + Sync>>> = Mutex::new(None);

struct FacadeLogger;

impl log::Log for FacadeLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= *LOG_FILTER.lock().expect("log filter mutex poisoned")
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let guard = LOG_CALLBACK.lock().expect("log callback mutex poisoned");
        if let Some(callback) = guard.as_ref() {
            callback(record.level(), &record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: FacadeLogger = FacadeLogger;

/// Installs `cfg` as the destination for every `log` record this crate and its dependencies emit,
/// replacing any previously installed callback. Pass `None` to silence logging again (the filter
/// still applies to nothing since there is no callback to invoke).
///
/// This calls [`log::set_logger`], which can only succeed once per process; a host that has
/// already installed its own logger before calling this will find this call silently ignored for
/// the purposes of routing through `log`'s global dispatch, though the callback is still recorded
/// and will receive records directly once installed first.
pub fn set_log(cfg: Option<LogConfig>) {
    match cfg {
        Some(cfg) => {
            *LOG_FILTER.lock().expect("log filter mutex poisoned") = cfg.level;
            *LOG_CALLBACK.lock().expect("log callback mutex poisoned") = Some(cfg.callback);
            log::set_max_level(cfg.level);
        }
        None => {
            *LOG_CALLBACK.lock().expect("log callback mutex poisoned") = None;
            log::set_max_level(log::LevelFilter::Off);
        }
    }
    let _ = log::set_logger(&LOGGER);
}
