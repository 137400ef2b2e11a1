//! Progress extraction from free-text tool output.
//!
//! The media engine prints status lines such as
//! `frame=  240 fps=0.0 size=1024kB time=00:00:10.00 bitrate=838.9kbits/s speed=20.1x`;
//! the transfer tool prints
//! `Transferred:   10.000 MiB / 60.000 MiB, 17%, 2.000 MiB/s, ETA 25s`.
//! Both parsers return `None` for anything they do not recognise; they never
//! fail.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::progress::ProgressSample;

static ENGINE_TIME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"time=\s*(-?)(\d+):(\d{1,2}):(\d{1,2}(?:\.\d+)?)").ok());

static ENGINE_SPEED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"speed=\s*(\d+(?:\.\d+)?)x").ok());

static TRANSFER_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Transferred:(.*ETA.*)").ok());

static ANSI_ESCAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").ok());

/// Parse one media-engine status line against a known total duration.
///
/// `elapsed` and `total` are media seconds; `rate` is the engine's speed
/// multiplier (media seconds per wall second).
#[must_use]
pub fn parse_engine_line(raw: &str, total_secs: f64) -> Option<ProgressSample> {
    let caps = ENGINE_TIME.as_ref()?.captures(raw)?;
    let hours: f64 = caps.get(2)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(3)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(4)?.as_str().parse().ok()?;

    // Negative timestamps appear while the muxer primes; treat as zero.
    let elapsed = if caps.get(1).is_some_and(|m| !m.as_str().is_empty()) {
        0.0
    } else {
        hours * 3600.0 + minutes * 60.0 + seconds
    };

    let rate = ENGINE_SPEED
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .filter(|r| *r > 0.0);

    Some(ProgressSample {
        elapsed,
        total: total_secs.max(0.0),
        rate,
    })
}

/// Parse one transfer-tool stats line.
///
/// When the transferred/total amounts and speed parse as byte sizes, the
/// sample is expressed in bytes; otherwise it falls back to the reported
/// percentage out of 100 with no rate.
#[must_use]
pub fn parse_transfer_line(raw: &str) -> Option<ProgressSample> {
    let cleaned = strip_ansi(raw);
    let caps = TRANSFER_LINE.as_ref()?.captures(&cleaned)?;
    let fields: Vec<&str> = caps.get(1)?.as_str().split(',').map(str::trim).collect();
    if fields.len() < 4 {
        return None;
    }

    let percent: f64 = fields[1].trim_end_matches('%').trim().parse().ok()?;

    let amounts = fields[0]
        .split_once('/')
        .and_then(|(done, total)| Some((parse_byte_size(done)?, parse_byte_size(total)?)));
    let speed = fields[2]
        .strip_suffix("/s")
        .and_then(parse_byte_size);

    match amounts {
        Some((done, total)) if total > 0.0 => Some(ProgressSample {
            elapsed: done,
            total,
            rate: speed,
        }),
        _ => Some(ProgressSample {
            elapsed: percent,
            total: 100.0,
            rate: None,
        }),
    }
}

/// Parse a human byte size such as `10.000 MiB`, `512 B`, or `1.5GB`.
#[must_use]
pub fn parse_byte_size(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number.parse().ok()?;

    let multiplier = match unit.trim() {
        "" | "B" | "Bytes" => 1.0,
        "KiB" | "k" | "K" => 1024.0,
        "MiB" | "M" => 1024.0 * 1024.0,
        "GiB" | "G" => 1024.0 * 1024.0 * 1024.0,
        "TiB" | "T" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "kB" | "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        _ => return None,
    };
    Some(value * multiplier)
}

fn strip_ansi(raw: &str) -> String {
    match ANSI_ESCAPE.as_ref() {
        Some(re) => re.replace_all(raw, "").into_owned(),
        None => raw.to_owned(),
    }
}
