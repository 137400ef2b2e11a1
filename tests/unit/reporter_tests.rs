//! Unit tests for progress throttling and status rendering.

use std::time::{Duration, Instant};

use merge_courier::models::progress::ProgressSample;
use merge_courier::progress::reporter::{
    format_elapsed, render_bar, render_status, ProgressReporter, BAR_WIDTH,
};

fn sample(elapsed: f64) -> ProgressSample {
    ProgressSample {
        elapsed,
        total: 100.0,
        rate: Some(10.0),
    }
}

#[test]
fn first_sample_is_always_rendered() {
    let start = Instant::now();
    let mut reporter = ProgressReporter::starting_at("Merging", Duration::from_secs(2), start);
    assert!(reporter.observe(start, &sample(1.0)).is_some());
}

#[test]
fn samples_inside_the_window_are_dropped() {
    let start = Instant::now();
    let mut reporter = ProgressReporter::starting_at("Merging", Duration::from_secs(2), start);

    assert!(reporter.observe(start, &sample(1.0)).is_some());
    assert!(reporter
        .observe(start + Duration::from_millis(500), &sample(2.0))
        .is_none());
    assert!(reporter
        .observe(start + Duration::from_millis(1999), &sample(3.0))
        .is_none());
    assert!(reporter
        .observe(start + Duration::from_secs(2), &sample(4.0))
        .is_some());
    assert!(reporter
        .observe(start + Duration::from_millis(3000), &sample(5.0))
        .is_none());
}

#[test]
fn at_most_one_update_per_window_over_a_burst() {
    let start = Instant::now();
    let mut reporter = ProgressReporter::starting_at("Merging", Duration::from_secs(2), start);

    // 100 samples per second for ten seconds.
    let emitted = (0..1000_u64)
        .filter(|n| {
            reporter
                .observe(start + Duration::from_millis(n * 10), &sample(0.0))
                .is_some()
        })
        .count();
    assert_eq!(emitted, 5);
}

#[test]
fn status_block_shows_label_bar_percent_elapsed_and_eta() {
    let text = render_status("Merging", &sample(50.0), Duration::from_secs(75));
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "Merging");
    assert_eq!(lines[1], format!("[{}] 50.0%", render_bar(50.0)));
    assert_eq!(lines[2], "Elapsed: 1m 15s");
    assert_eq!(lines[3], "ETA: 5s");
}

#[test]
fn eta_is_calculating_without_a_rate() {
    let unknown = ProgressSample {
        elapsed: 10.0,
        total: 100.0,
        rate: None,
    };
    let text = render_status("Uploading", &unknown, Duration::ZERO);
    assert!(text.ends_with("ETA: calculating\u{2026}"), "{text}");
}

#[test]
fn bar_has_fixed_width_and_clamps() {
    for percent in [-10.0, 0.0, 33.3, 99.9, 100.0, 250.0] {
        assert_eq!(render_bar(percent).chars().count(), BAR_WIDTH);
    }
    assert!(render_bar(0.0).chars().all(|c| c == '\u{2591}'));
    assert!(render_bar(100.0).chars().all(|c| c == '\u{2588}'));
    assert_eq!(render_bar(50.0).chars().filter(|c| *c == '\u{2588}').count(), 10);
}

#[test]
fn elapsed_uses_largest_two_units() {
    assert_eq!(format_elapsed(0), "0s");
    assert_eq!(format_elapsed(59), "59s");
    assert_eq!(format_elapsed(61), "1m 1s");
    assert_eq!(format_elapsed(3600), "1h 0m");
    assert_eq!(format_elapsed(7325), "2h 2m");
}

#[test]
fn percent_is_zero_for_unknown_total() {
    let unknown = ProgressSample {
        elapsed: 10.0,
        total: 0.0,
        rate: Some(1.0),
    };
    assert!(unknown.percent().abs() < f64::EPSILON);
    assert!(unknown.eta_secs().is_none());
}
