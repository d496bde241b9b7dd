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


//! # zkChannels Logs
//!
//! Structured log codes emitted while building, checking and closing
//! payment channels. Every log is one JSON object per line.
//!

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

#[macro_use] extern crate lazy_static;
extern crate serde;
#[macro_use] extern crate serde_derive;
extern crate serde_json;
extern crate time;

extern crate zkchannel_common as common;

#[macro_use] pub mod log;
pub mod channel;
pub use self::channel::*;
pub mod io_log;
pub use self::io_log::*;
pub mod log_codes;

use std::{fmt, io, sync, thread};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Prefix of every log ID in this crate.
pub const ID_PREFIX_ZKCHANNEL: &str = "Z";

#[derive(PartialEq, Eq, Hash, Debug, Clone)]
struct LogIndex {
    file_name: String,
    line_num: u32,
}

/// Count of lines dropped from one call site during the last period.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Default)]
pub struct ThrottleCount<'a> {
    pub log_name: &'a str,
    pub log_id: &'a str,
    pub originating_file_name: &'a str,
    pub originating_line_number: u32,
    pub suppressed_count: u32,
}

impl<'a> Log for ThrottleCount<'a> {
    const SEVERITY: Severity = Severity::Warn;
    const LOG_ID: &'static str = "Z-9999";

    fn desc(&self) -> &str {
        "suppressed log message"
    }
}

/// Sink and throttling state shared by every log call.
pub struct GlobalContext {
    out: Box<dyn io::Write + Send>,
    /// Tool name written into each line
    name: &'static str,
    min_severity: Severity,
    /// Lines written per call site since `log_period_start`
    log_accounting: HashMap<LogIndex, u32>,
    log_period_start: Instant,
    minimum_log_period: Duration,
    log_emission_limit: u32,
}

lazy_static! {
    static ref GLOBAL_CONTEXT: sync::Mutex<GlobalContext> = sync::Mutex::new(
        GlobalContext {
            #[cfg(not(test))]
            out: Box::new(io::sink()),
            #[cfg(test)]
            out: Box::new(io::stdout()),
            name: "-",
            min_severity: Severity::Trace,
            log_accounting: HashMap::with_capacity(100),
            log_period_start: Instant::now(),
            minimum_log_period: Duration::from_millis(60000),
            log_emission_limit: 1000,
        }
    );
}

/// Point logging at `out`, filtering below `min_severity`. Unset limits
/// keep their previous values.
pub fn initialize(
    min_severity: Severity,
    log_period_ms: Option<u64>,
    log_emission_limit: Option<u32>,
    name: &'static str,
    out: Box<dyn io::Write + Send>,
) {
    let mut lock = GLOBAL_CONTEXT.lock().unwrap();
    lock.out = out;
    lock.name = name;
    lock.min_severity = min_severity;
    if let Some(value) = log_period_ms { lock.minimum_log_period = Duration::from_millis(value); }
    if let Some(value) = log_emission_limit { lock.log_emission_limit = value; }
}

/// strftime format of the `time` field.
pub const TIME_FORMAT: &str = "%F %T.%f%z";

fn serialize_time<S: serde::Serializer>(t: &time::Tm, s: S) -> Result<S::Ok, S::Error> {
    let tmfmt = t.strftime(TIME_FORMAT).map_err(serde::ser::Error::custom)?;
    s.collect_str(&tmfmt)
}

fn deserialize_time<'de, D>(d: D) -> Result<time::Tm, D::Error>
    where D: serde::Deserializer<'de>,
{
    struct TmVisitor;
    impl<'de> serde::de::Visitor<'de> for TmVisitor {
        type Value = time::Tm;
        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a timestamp")
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> where E: serde::de::Error {
            time::strptime(v, TIME_FORMAT).map_err(serde::de::Error::custom)
        }
    }
    d.deserialize_str(TmVisitor)
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Log level, lowest first
pub enum Severity {
    /// Sighash digests and other secret-adjacent detail
    Trace,
    /// Intermediate values of a build or check
    Debug,
    /// Transactions built, state changes
    Info,
    /// Rejected events and throttled call sites
    Warn,
    /// A tool invocation failed
    Error,
    /// Emitted only through `slog_fatal!`, which panics afterwards
    Fatal,
}

impl Severity {
    /// Name as printed in human-readable output
    pub fn upper(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

/// A log line as written by this crate, borrowed from its JSON text.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LogMessage<'a> {
    #[serde(serialize_with = "serialize_time", deserialize_with = "deserialize_time")]
    pub time: time::Tm,
    pub process: &'a str,
    #[serde(default)]
    pub thread: Option<&'a str>,
    pub severity: Severity,
    pub log_id: &'a str,
    pub desc: &'a str,
    pub name: &'a str,
    pub file: &'a str,
    pub line: u32,
    #[serde(borrow)]
    pub context: &'a serde_json::value::RawValue,
    #[serde(borrow)]
    pub data: &'a serde_json::value::RawValue,
}

impl<'a> LogMessage<'a> {
    /// Parse the log-specific data.
    pub fn parse<T: serde::Deserialize<'a>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.data.get())
    }

    /// Parse the channel context the log was emitted under.
    pub fn channel_context(&self) -> Result<ChannelContext, serde_json::Error> {
        serde_json::from_str(self.context.get())
    }

    /// Interpret the log as the given log type, if the ID matches.
    pub fn try_as<T: Log + serde::Deserialize<'a>>(&self) -> Option<T> {
        if self.log_id == T::LOG_ID {
            self.parse().ok()
        } else {
            None
        }
    }
}

#[derive(Serialize)]
struct InternalLogMessage<'a, C: serde::Serialize + 'a, D: serde::Serialize + 'a> {
    // Must stay field-compatible with [LogMessage].
    #[serde(serialize_with = "serialize_time")]
    time: time::Tm,
    process: &'a str,
    thread: Option<&'a str>,
    severity: Severity,
    log_id: &'static str,
    desc: &'a str,
    name: &'a str,
    file: &'a str,
    line: u32,
    context: &'a C,
    data: &'a D,
}

/// A structured log line. Implemented through `impl_log!`.
pub trait Log: serde::Serialize + Sized {
    /// Level the line is emitted at
    const SEVERITY: Severity;

    /// `Z-` code, unique across the crate
    const LOG_ID: &'static str;

    /// Fixed one-line summary
    fn desc(&self) -> &str;

    /// Serialize one JSON line into `output_sink`.
    fn log_inner<C>(&self, mut output_sink: &mut Box<dyn io::Write + Send>,
        process: &str, file: &str, line: u32, name: &str, context: &C)
    where
        C: serde::Serialize,
    {
        debug_assert!(Self::LOG_ID.starts_with(ID_PREFIX_ZKCHANNEL));

        // Sink errors are dropped
        let _ = serde_json::to_writer(
            &mut output_sink,
            &InternalLogMessage {
                time: time::now(),
                process: process,
                thread: thread::current().name(),
                severity: Self::SEVERITY,
                log_id: Self::LOG_ID,
                desc: self.desc(),
                name: name,
                file: file,
                line: line,
                context: context,
                data: self,
            },
        );
        let _ = writeln!(output_sink, "");
    }

    /// Emit, subject to severity filtering and per-site throttling
    fn log<C: serde::Serialize>(&self, file: &str, line: u32, name: &str, ctx: &C) {
        let mut gctx = GLOBAL_CONTEXT.lock().unwrap();
        let gctx = &mut *gctx;

        if Self::SEVERITY < gctx.min_severity {
            return;
        }

        let accounting_index = LogIndex { file_name: file.to_string(), line_num: line };
        let log_count_element = gctx.log_accounting.entry(accounting_index).or_insert(0);
        *log_count_element += 1;
        if *log_count_element > gctx.log_emission_limit {
            return;
        }

        let process = gctx.name;

        if Instant::now() > gctx.log_period_start + gctx.minimum_log_period {
            for (index, count) in gctx.log_accounting.drain() {
                if count <= gctx.log_emission_limit {
                    continue;
                }
                let tc = ThrottleCount {
                    log_name: name,
                    log_id: Self::LOG_ID,
                    originating_file_name: &index.file_name,
                    originating_line_number: index.line_num,
                    suppressed_count: count - gctx.log_emission_limit,
                };
                tc.log_inner(&mut gctx.out, process, file!(), line!(), "ThrottleCount", ctx);
            }
            gctx.log_period_start = Instant::now();
        }

        self.log_inner(&mut gctx.out, process, file, line, name, ctx);

        assert!(Self::SEVERITY != Severity::Fatal,
            "fatal log was not called with slog_fatal: {}", Self::LOG_ID,
        );
    }

    /// Emit unconditionally, then panic
    fn log_fatal<C: serde::Serialize>(&self, file: &str, line: u32, name: &str, ctx: &C) -> ! {
        {
            let mut gctx = GLOBAL_CONTEXT.lock().unwrap();
            let process = gctx.name;
            self.log_inner(&mut gctx.out, process, file, line, name, ctx);
        }

        panic!("fatal log {}", Self::LOG_ID);
    }
}

/// The channel a log line is about, attached to every log as its context.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct ChannelContext {
    /// Hex channel id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// Name of the channel's current status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

lazy_static! {
    static ref GLOBAL_CHANNEL_CONTEXT: sync::Mutex<ChannelContext> = sync::Mutex::new(
        Default::default()
    );
}

/// Set the channel context attached to subsequent logs.
pub fn set_channel_context(ctx: ChannelContext) {
    let mut lock = GLOBAL_CHANNEL_CONTEXT.lock().unwrap();
    *lock = ctx;
}

/// The channel context currently attached to logs.
pub fn get_channel_context() -> ChannelContext {
    GLOBAL_CHANNEL_CONTEXT.lock().unwrap().clone()
}

/// Source path of the call site relative to the crate directory
#[macro_export]
macro_rules! filename {
    () => (file!().rsplit("zkchannel/").next().unwrap_or(file!()))
}

/// Emit a structured log under the current channel context.
///
/// ```rust,ignore
/// slog!(StateUpdated, seq: 3, cust_bal: 10, merch_bal: 20);
/// ```
#[macro_export]
macro_rules! slog {
    ($struct:ident) => {{
        $crate::Log::log(&$crate::$struct { }, $crate::filename!(), line!(), stringify!($struct), &$crate::get_channel_context())
    }};
    ($struct:ident, $( $args:tt )*) => {{
        $crate::Log::log(&$crate::$struct {
            $( $args )*
        }, $crate::filename!(), line!(), stringify!($struct), &$crate::get_channel_context())
    }};
}

/// As `slog!`, for `Fatal` logs. Never returns.
#[macro_export]
macro_rules! slog_fatal {
    ($struct:ident, $( $args:tt )*) => {{
        $crate::Log::log_fatal(&$crate::$struct {
            $( $args )*
        }, $crate::filename!(), line!(), stringify!($struct), &$crate::get_channel_context())
    }}
}

/// Free-form `log!(Trace, ..)` text
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub struct UnstructuredLogTrace {
    pub message: String,
}

/// Free-form `log!(Debug, ..)` text
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub struct UnstructuredLogDebug {
    pub message: String,
}

/// Free-form `log!(Info, ..)` text
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub struct UnstructuredLogInfo {
    pub message: String,
}

/// Free-form `log!(Warn, ..)` text
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub struct UnstructuredLogWarn {
    pub message: String,
}

/// Free-form `log!(Error, ..)` text
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub struct UnstructuredLogError {
    pub message: String,
}

/// Free-form `log!(Fatal, ..)` text
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Default)]
pub struct UnstructuredLogFatal {
    pub message: String,
}
