//! Artifact staleness resolution.
//!
//! Rendered artifacts are cached on disk next to their sources and validated
//! purely by modification time. See [`StalenessMode`] for the two policies.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveTime, TimeDelta, TimeZone};
pub use mmdgen_config::StalenessMode;

/// Decide whether an artifact must be rebuilt.
///
/// `artifact_mtime` is `None` when the artifact does not exist. `now` only
/// matters for [`StalenessMode::CalendarDay`], which additionally rejects
/// artifacts written before local midnight so that every diagram is rebuilt
/// at least once per day (picking up renderer upgrades or theme changes).
#[must_use]
pub fn is_stale(
    mode: StalenessMode,
    source_mtime: SystemTime,
    artifact_mtime: Option<SystemTime>,
    now: DateTime<Local>,
) -> bool {
    let Some(artifact_mtime) = artifact_mtime else {
        return true;
    };

    if artifact_mtime < source_mtime {
        return true;
    }

    match mode {
        StalenessMode::Simple => false,
        StalenessMode::CalendarDay => artifact_mtime < SystemTime::from(start_of_day(&now)),
    }
}

/// Stat `artifact` and decide whether it must be rebuilt, using the current time.
///
/// # Errors
///
/// Returns the stat error for any failure other than the artifact not existing.
pub async fn artifact_is_stale(
    mode: StalenessMode,
    source_mtime: SystemTime,
    artifact: &Path,
) -> io::Result<bool> {
    let artifact_mtime = match tokio::fs::metadata(artifact).await {
        Ok(meta) => Some(meta.modified()?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    Ok(is_stale(mode, source_mtime, artifact_mtime, Local::now()))
}

/// First instant of the calendar day `now` falls in, in `now`'s time zone.
///
/// Where a DST jump skips midnight, the day starts at the first local time
/// that exists.
fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let midnight = now.date_naive().and_time(NaiveTime::MIN);

    (0..=180)
        .map(TimeDelta::minutes)
        .find_map(|offset| tz.from_local_datetime(&(midnight + offset)).earliest())
        .unwrap_or_else(|| now.clone())
}
