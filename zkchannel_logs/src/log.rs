//{{ Liquid }}
//Copyright (C) {{ 2015,2016,2017,2018 }}  {{ Blockstream }}

//This program is free software: you can redistribute it and/or modify
//it under the terms of the GNU Affero General Public License as published by
//the Free Software Foundation, either version 3 of the License, or
//(at your option) any later version.

//This program is distributed in the hope that it will be useful,
//but WITHOUT ANY WARRANTY; without even the implied warranty of
//MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//GNU Affero General Public License for more details.

//You should have received a copy of the GNU Affero General Public License
//along with this program.  If not, see <http://www.gnu.org/licenses/>.


//! # Simple Log
//! Unstructured logging macros on top of the structured log sink
//!

use std::fmt;

/// Sink for the `log!` macros; silent under test
#[cfg(test)]
pub fn log<T: fmt::Display>(_: &str, _: u32, _: crate::Severity, _: &T) {
}

/// Wrap `message` in the unstructured log type for `level` and emit it
#[cfg(not(test))]
pub fn log<T: fmt::Display>(file: &str, line: u32, level: crate::Severity, message: &T) {
    // slog! would record this file and line instead of the caller's
    use get_channel_context;
    use UnstructuredLogTrace;
    use UnstructuredLogDebug;
    use UnstructuredLogInfo;
    use UnstructuredLogWarn;
    use UnstructuredLogError;
    use UnstructuredLogFatal;

    let ctx = get_channel_context();
    let message = message.to_string();
    match level {
        crate::Severity::Trace => {
            crate::Log::log(&UnstructuredLogTrace { message }, file, line, "", &ctx)
        }
        crate::Severity::Debug => {
            crate::Log::log(&UnstructuredLogDebug { message }, file, line, "", &ctx)
        }
        crate::Severity::Info => {
            crate::Log::log(&UnstructuredLogInfo { message }, file, line, "", &ctx)
        }
        crate::Severity::Warn => {
            crate::Log::log(&UnstructuredLogWarn { message }, file, line, "", &ctx)
        }
        crate::Severity::Error => {
            crate::Log::log(&UnstructuredLogError { message }, file, line, "", &ctx)
        }
        crate::Severity::Fatal => {
            crate::Log::log_fatal(&UnstructuredLogFatal { message }, file, line, "", &ctx)
        }
    }
}

/// Free-form log at the named level, e.g. `log!(Warn, "fee {}", fee)`.
#[macro_export]
macro_rules! log {
    ($level:ident, $($arg:tt)+) => ({
        $crate::log::log($crate::filename!(), line!(), $crate::Severity::$level, &format_args!($($arg)+))
    })
}

/// `log!(Trace, ..)`
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => ({
        $crate::log::log($crate::filename!(), line!(), $crate::Severity::Trace, &format_args!($($arg)+))
    })
}

/// `log!(Debug, ..)`
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => ({
        $crate::log::log($crate::filename!(), line!(), $crate::Severity::Debug, &format_args!($($arg)+))
    })
}

/// `log!(Info, ..)`
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => ({
        $crate::log::log($crate::filename!(), line!(), $crate::Severity::Info, &format_args!($($arg)+))
    })
}

/// `?` equivalent that logs the error before returning it.
#[macro_export]
macro_rules! log_try {
    ($level:ident, $e:expr) => ({
        match $e {
            Ok(res) => res,
            Err(e) => {
                $crate::log::log($crate::filename!(), line!(), $crate::Severity::$level, &e);
                return Err(From::from(e));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    fn parse_delay(s: &str) -> Result<u16, String> {
        let n: Result<u16, String> = s.parse().map_err(|_| format!("bad delay {}", s));
        Ok(log_try!(Warn, n))
    }

    #[test]
    fn log_try_passes_through() {
        assert_eq!(parse_delay("1487"), Ok(1487));
        assert_eq!(parse_delay("x"), Err("bad delay x".to_string()));
    }

    #[test]
    fn use_fancy_macros() {
        let delay = 1487;
        log!(Warn, "delay {} blocks", delay);
        info!("This is info: {}", delay);
        debug!("This is debug: {}", delay);
        trace!("This is trace: {}", delay);
    }
}
