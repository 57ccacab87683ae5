/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt::{Arguments, Write as _};
use std::io::{self, Write};

use chrono::{DateTime, Local};
use slog::{Drain, KV, Level, OwnedKVList, Record, Serializer};
use slog_scope::GlobalLoggerGuard;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

struct FormatterKv<'a>(&'a mut Vec<(String, String)>);

impl Serializer for FormatterKv<'_> {
    fn emit_arguments(&mut self, key: slog::Key, value: &Arguments) -> slog::Result {
        let v = match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        };
        self.0.push((key.to_string(), v));
        Ok(())
    }
}

fn write_line<IO: Write>(
    io: &mut IO,
    time: DateTime<Local>,
    record: &Record,
    logger_values: &OwnedKVList,
) -> slog::Result {
    let mut kv_pairs = Vec::new();
    let mut kv_formatter = FormatterKv(&mut kv_pairs);
    logger_values.serialize(record, &mut kv_formatter)?;
    record.kv().serialize(record, &mut kv_formatter)?;

    let mut msg = String::new();
    let _ = write!(msg, "{}", record.msg());
    if msg.is_empty() {
        msg.push_str("()");
    }

    write!(io, "{} {}", time.format(TIME_FORMAT), record.level())?;
    for (k, v) in &kv_pairs {
        write!(io, " {k}: {v},")?;
    }
    write!(io, " {msg}")?;
    writeln!(io, " <{}:{}>", record.module(), record.line())?;
    Ok(())
}

/// Writes one line per record to stderr.
struct StderrDrain;

impl Drain for StderrDrain {
    type Ok = ();
    type Err = slog::Error;

    fn log(&self, record: &Record, values: &OwnedKVList) -> slog::Result {
        let mut buf = Vec::with_capacity(256);
        write_line(&mut buf, Local::now(), record, values)?;

        let mut stderr = io::stderr().lock();
        stderr.write_all(&buf)?;
        stderr.flush()?;
        Ok(())
    }
}

fn log_level(verbose_level: u8) -> log::Level {
    match verbose_level {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    }
}

pub fn setup(verbose_level: u8) -> Result<GlobalLoggerGuard, log::SetLoggerError> {
    let level = log_level(verbose_level);
    let slog_level = match level {
        log::Level::Error => Level::Error,
        log::Level::Warn => Level::Warning,
        log::Level::Info => Level::Info,
        log::Level::Debug => Level::Debug,
        log::Level::Trace => Level::Trace,
    };
    let drain = slog::LevelFilter::new(StderrDrain, slog_level).ignore_res();
    let logger = slog::Logger::root(drain, slog::o!());

    let scope_guard = slog_scope::set_global_logger(logger);

    slog_stdlog::init_with_level(level)?;
    Ok(scope_guard)
}
