use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone, Utc};
use std::fmt::Display;

/// Loop images are published every five minutes
pub const FRAME_STEP_MINUTES: i64 = 5;

/// One candidate loop image time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTime {
    pub instant: DateTime<Utc>,
    /// Compact UTC form used in image names, e.g. "202108100455"
    pub radar_time: String,
    /// Time of day shown on the frame
    pub label: String,
}

/// Most recent five minute boundary at or before `now`
pub fn latest_frame_time(now: DateTime<Utc>) -> DateTime<Utc> {
    let step_secs = FRAME_STEP_MINUTES * 60;
    let past_boundary = ChronoDuration::seconds(now.timestamp().rem_euclid(step_secs))
        + ChronoDuration::nanoseconds(i64::from(now.timestamp_subsec_nanos()));
    now - past_boundary
}

/// Render the time of day in the display time zone, e.g. "4:55:00 PM"
pub fn time_of_day_label<Tz>(instant: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    instant.with_timezone(tz).format("%-I:%M:%S %p").to_string()
}

/// Candidate loop image times, newest first, labelled in `tz`
pub fn candidate_frame_times<Tz>(now: DateTime<Utc>, count: usize, tz: &Tz) -> Vec<FrameTime>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let latest = latest_frame_time(now);
    let step = ChronoDuration::minutes(FRAME_STEP_MINUTES);

    (0..count)
        .map(|i| {
            let instant = latest - step * i as i32;
            FrameTime {
                instant,
                radar_time: bom::radar_time_string(&instant),
                label: time_of_day_label(&instant, tz),
            }
        })
        .collect()
}

/// Candidate loop image times labelled in the local time zone
pub fn candidate_frame_times_local(now: DateTime<Utc>, count: usize) -> Vec<FrameTime> {
    candidate_frame_times(now, count, &Local)
}
