//! Plain-text renderings for queue summaries, reports, and merge status.

use std::time::Duration;

use crate::models::item::QueueItem;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Total size above which the pre-merge report carries a notice.
pub const LARGE_MERGE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Format seconds as `HH:MM:SS`.
#[must_use]
pub fn format_duration(secs: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Bytes as mebibytes with `precision` decimals.
#[must_use]
pub fn format_mb(bytes: u64, precision: usize) -> String {
    #[allow(clippy::cast_precision_loss)]
    let mb = bytes as f64 / MIB;
    format!("{mb:.precision$}MB")
}

/// Bytes as gibibytes with two decimals.
#[must_use]
pub fn format_gb(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let gb = bytes as f64 / GIB;
    format!("{gb:.2}GB")
}

/// Numbered queue listing with totals.
#[must_use]
pub fn queue_summary(items: &[QueueItem], max_items: usize) -> String {
    if items.is_empty() {
        return format!("\u{1f4c2} *Queue (0/{max_items})*\n\nNo videos added yet. Send videos in this DM to queue them.");
    }

    let mut out = format!("\u{1f4c2} *Queue ({}/{max_items})*\n", items.len());
    for (idx, item) in items.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {}\n      {} | {} | {}",
            idx + 1,
            item.display_name,
            format_duration(item.duration_secs()),
            item.media.resolution_label(),
            format_mb(item.size_bytes, 1),
        ));
    }

    let total_bytes: u64 = items.iter().map(|i| i.size_bytes).sum();
    let total_secs: f64 = items.iter().map(QueueItem::duration_secs).sum();
    out.push_str(&format!(
        "\n\nTotal size: {}\nTotal duration: {}",
        format_gb(total_bytes),
        format_duration(total_secs),
    ));
    out
}

/// Pre-merge check: counts, totals, warnings, and a large-size notice.
#[must_use]
pub fn merge_report(items: &[QueueItem], warnings: &[String]) -> String {
    let total_bytes: u64 = items.iter().map(|i| i.size_bytes).sum();
    let total_secs: f64 = items.iter().map(QueueItem::duration_secs).sum();

    let mut out = format!(
        "\u{1f50d} *Merge check*\n{RULE}\nVideos: {}\nTotal duration: {}\nTotal size: {}\n",
        items.len(),
        format_duration(total_secs),
        format_gb(total_bytes),
    );

    if warnings.is_empty() {
        out.push_str("\n\u{2705} All videos share codec, resolution, frame rate, and audio layout.");
    } else {
        out.push_str("\n\u{26a0}\u{fe0f} Compatibility warnings:");
        for warning in warnings {
            out.push_str("\n\u{2022} ");
            out.push_str(warning);
        }
        out.push_str("\nThe merge uses stream copy and may fail on mismatched inputs.");
    }

    if total_bytes > LARGE_MERGE_BYTES {
        out.push_str("\n\n\u{2139}\u{fe0f} Large merge (over 2GB): processing and upload will take a while.");
    }
    out
}

/// Caption posted with a delivered artifact.
#[must_use]
pub fn completion_caption(name: &str, size_bytes: u64, duration_secs: f64, processing: Duration) -> String {
    format!(
        "\u{2705} *Merge complete*\n{RULE}\n{name}\nSize: {}\nDuration: {}\nProcessing time: {}s",
        format_mb(size_bytes, 2),
        format_duration(duration_secs),
        processing.as_secs(),
    )
}

/// Status text for the preparation stage.
#[must_use]
pub fn stage_preparing(items: usize) -> String {
    format!("\u{1f500} *Merging videos*\n{RULE}\n\u{23f3} Preparing files ({items} videos)")
}

/// Label used by the progress reporter during the merge stage.
#[must_use]
pub fn stage_merging(total_bytes: u64) -> String {
    format!(
        "\u{1f500} *Merging videos*\n{RULE}\n\u{2705} Files ready\n\u{23f3} Merging (stream copy), {} total",
        format_mb(total_bytes, 2)
    )
}

/// Status text for the upload stage.
#[must_use]
pub fn stage_uploading(size_bytes: u64, target: &str) -> String {
    format!(
        "\u{1f500} *Merging videos*\n{RULE}\n\u{2705} Files ready\n\u{2705} Merge complete ({})\n\u{23f3} Uploading via {target}",
        format_mb(size_bytes, 2)
    )
}

/// Status text after a successful remote-storage upload.
#[must_use]
pub fn remote_complete(remote: &str, name: &str, size_bytes: u64, processing: Duration) -> String {
    format!(
        "\u{2705} *Uploaded to {remote}*\n{RULE}\n{name}\nSize: {}\nTotal time: {}s",
        format_mb(size_bytes, 2),
        processing.as_secs(),
    )
}

/// Reply after a remote-storage configuration was installed.
#[must_use]
pub fn remote_configured(remote: &str, destination_switched: bool) -> String {
    let next = if destination_switched {
        "Merged videos will now be uploaded there."
    } else {
        "Use `/merge dest remote` to upload merged videos there."
    };
    format!("\u{2705} *Remote storage configured*\n{RULE}\nRemote: {remote}\n{next}")
}

/// Reply when an uploaded remote-storage configuration is refused.
#[must_use]
pub fn remote_config_rejected(reason: &str) -> String {
    format!("\u{274c} Invalid rclone config file: {reason}\nPlease send a valid rclone.conf.")
}

/// Status text for a failed merge or delivery.
#[must_use]
pub fn failure(reason: &str) -> String {
    format!("\u{274c} *Merge failed*\n{RULE}\n{reason}\nThe queue has been cleared.")
}

/// Usage text for the slash command.
#[must_use]
pub fn help() -> String {
    [
        "*/merge* commands:",
        "`status`  show the queue",
        "`check`  compatibility report",
        "`start`  merge the queue",
        "`remove <n>`  drop item n",
        "`move <from> <to>`  reorder",
        "`clear`  empty the queue",
        "`reset`  start a fresh session",
        "`dest direct|remote`  delivery destination",
        "`format video|document`  upload format",
        "`name <file>`  output file name",
        "share an `rclone.conf` file to set up remote storage",
    ]
    .join("\n")
}
