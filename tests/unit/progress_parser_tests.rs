//! Unit tests for media-engine and transfer-tool progress line parsing.

use merge_courier::progress::parser::{parse_byte_size, parse_engine_line, parse_transfer_line};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn engine_line_yields_elapsed_total_and_speed() {
    let line = "frame=  240 fps=0.0 q=-1.0 size=    1024kB time=00:01:05.50 bitrate= 838.9kbits/s speed=20.1x";
    let sample = parse_engine_line(line, 131.0).expect("sample");

    assert!(close(sample.elapsed, 65.5));
    assert!(close(sample.total, 131.0));
    assert!(close(sample.rate.expect("rate"), 20.1));
    assert!(close(sample.percent(), 50.0));
}

#[test]
fn engine_line_with_hours() {
    let sample = parse_engine_line("size=1kB time=01:00:00.00 speed=1x", 7200.0).expect("sample");
    assert!(close(sample.elapsed, 3600.0));
}

#[test]
fn negative_engine_time_counts_as_zero() {
    let sample = parse_engine_line("size=0kB time=-00:00:00.02 bitrate=N/A speed=N/A", 10.0)
        .expect("sample");
    assert!(close(sample.elapsed, 0.0));
    assert!(sample.rate.is_none(), "N/A speed is not a rate");
    assert!(sample.eta_secs().is_none());
}

#[test]
fn zero_speed_is_not_a_rate() {
    let sample = parse_engine_line("time=00:00:01.00 speed=0x", 10.0).expect("sample");
    assert!(sample.rate.is_none());
}

#[test]
fn engine_line_without_time_is_ignored() {
    assert!(parse_engine_line("Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'a.mp4':", 10.0).is_none());
    assert!(parse_engine_line("", 10.0).is_none());
    assert!(parse_engine_line("time=garbage speed=2x", 10.0).is_none());
}

#[test]
fn engine_percent_is_clamped_when_time_overshoots_total() {
    let sample = parse_engine_line("time=00:00:12.00 speed=3x", 10.0).expect("sample");
    assert!(close(sample.percent(), 100.0));
    assert!(close(sample.eta_secs().expect("eta"), 0.0));
}

#[test]
fn transfer_line_yields_bytes_and_speed() {
    let line = "Transferred:   10.000 MiB / 60.000 MiB, 17%, 2.000 MiB/s, ETA 25s";
    let sample = parse_transfer_line(line).expect("sample");

    let mib = 1024.0 * 1024.0;
    assert!(close(sample.elapsed, 10.0 * mib));
    assert!(close(sample.total, 60.0 * mib));
    assert!(close(sample.rate.expect("rate"), 2.0 * mib));
    assert!(close(sample.eta_secs().expect("eta"), 25.0));
}

#[test]
fn transfer_line_with_ansi_codes_is_cleaned() {
    let line = "\u{1b}[2K\u{1b}[1GTransferred:   \t  1 GiB / 4 GiB, 25%, 100 MiB/s, ETA 30s";
    let sample = parse_transfer_line(line).expect("sample");
    assert!(close(sample.percent(), 25.0));
}

#[test]
fn transfer_line_falls_back_to_percent_when_sizes_are_unreadable() {
    let line = "Transferred:   ?? / ??, 42%, -, ETA -";
    let sample = parse_transfer_line(line).expect("sample");
    assert!(close(sample.elapsed, 42.0));
    assert!(close(sample.total, 100.0));
    assert!(sample.rate.is_none());
}

#[test]
fn transfer_file_count_line_is_ignored() {
    assert!(parse_transfer_line("Transferred:            0 / 1, 0%").is_none());
    assert!(parse_transfer_line("Elapsed time:        2.0s").is_none());
    assert!(parse_transfer_line("Transferred: 1 MiB / 2 MiB, ETA 1s").is_none());
}

#[test]
fn byte_sizes_in_binary_and_decimal_units() {
    assert!(close(parse_byte_size("512 B").expect("B"), 512.0));
    assert!(close(parse_byte_size("1.5 KiB").expect("KiB"), 1536.0));
    assert!(close(parse_byte_size("2MiB").expect("MiB"), 2.0 * 1024.0 * 1024.0));
    assert!(close(parse_byte_size("1 GB").expect("GB"), 1e9));
    assert!(close(parse_byte_size("3 kB").expect("kB"), 3000.0));
    assert!(close(parse_byte_size("7").expect("bare"), 7.0));
    assert!(parse_byte_size("lots").is_none());
    assert!(parse_byte_size("1 parsec").is_none());
}
