use std::time::Duration;
use tracing::debug;

use super::types::{Cue, Segment, SplitPlan, Timeline};
use super::{PlanError, Result};

/// Plan `split.count` segments over `timeline` without cutting through any cue.
///
/// `cues` must be sorted by start time, non-overlapping, and lie inside the
/// timeline. The result is all-or-nothing: either every segment is returned or
/// the first problem found is reported.
pub fn plan(timeline: &Timeline, cues: &[Cue], split: &SplitPlan) -> Result<Vec<Segment>> {
    if split.count < 1 {
        return Err(PlanError::InvalidConfig(
            "segment count must be at least 1".to_string(),
        ));
    }

    let duration = timeline.duration();
    if duration.is_zero() {
        return Err(PlanError::DegenerateInput(
            "timeline duration must be greater than zero".to_string(),
        ));
    }

    if u128::from(split.count) > duration.as_millis() {
        return Err(PlanError::DegenerateInput(format!(
            "cannot split {:.3}s into {} segments",
            duration.as_secs_f64(),
            split.count
        )));
    }

    validate_cues(cues, duration)?;

    let boundaries = core_boundaries(duration, cues, split.count)?;
    let mut segments = Vec::with_capacity(split.count as usize);

    for i in 0..split.count as usize {
        let (range_start, range_end) = expanded_window(&boundaries, i, cues, split.overlap)?;

        let segment_cues = cues
            .iter()
            .filter(|cue| cue.start >= range_start && cue.end <= range_end)
            .map(|cue| cue.retimed(range_start))
            .collect::<Vec<_>>();

        debug!(
            "Segment {}: core {:.3}-{:.3}s, range {:.3}-{:.3}s, {} cues",
            i + 1,
            boundaries[i].as_secs_f64(),
            boundaries[i + 1].as_secs_f64(),
            range_start.as_secs_f64(),
            range_end.as_secs_f64(),
            segment_cues.len()
        );

        segments.push(Segment {
            index: i + 1,
            core_start: boundaries[i],
            core_end: boundaries[i + 1],
            range_start,
            range_end,
            cues: segment_cues,
        });
    }

    Ok(segments)
}

fn validate_cues(cues: &[Cue], duration: Duration) -> Result<()> {
    for (i, cue) in cues.iter().enumerate() {
        if cue.end <= cue.start {
            return Err(PlanError::DegenerateInput(format!(
                "cue {} ends before it starts ({:.3}s -> {:.3}s)",
                i + 1,
                cue.start.as_secs_f64(),
                cue.end.as_secs_f64()
            )));
        }
        if cue.end > duration {
            return Err(PlanError::DegenerateInput(format!(
                "cue {} ends at {:.3}s, past the timeline end {:.3}s",
                i + 1,
                cue.end.as_secs_f64(),
                duration.as_secs_f64()
            )));
        }
    }

    for (i, pair) in cues.windows(2).enumerate() {
        if pair[1].start < pair[0].end {
            return Err(PlanError::DegenerateInput(format!(
                "cues {} and {} are unsorted or overlapping",
                i + 1,
                i + 2
            )));
        }
    }

    Ok(())
}

/// Boundaries `0 = b0 <= b1 <= ... <= bN = duration` of the core windows
fn core_boundaries(duration: Duration, cues: &[Cue], count: u32) -> Result<Vec<Duration>> {
    let mut boundaries = Vec::with_capacity(count as usize + 1);
    let mut previous = Duration::ZERO;
    boundaries.push(previous);

    for i in 1..count {
        let ideal = duration
            .checked_mul(i)
            .map(|scaled| scaled / count)
            .ok_or_else(|| {
                PlanError::DegenerateInput("timeline duration is too long to divide".to_string())
            })?;

        let snapped = snap_core_boundary(ideal, previous, duration, cues);
        boundaries.push(snapped);
        previous = snapped;
    }

    boundaries.push(duration);
    Ok(boundaries)
}

/// Move an ideal boundary onto the nearer edge of the cue it cuts through.
///
/// Ties go to the cue start. When the nearer edge would leave a core window
/// empty the other edge is tried. If neither edge leaves room, the nearer edge
/// is kept inside `[previous, duration]` and the window is allowed to be empty.
fn snap_core_boundary(
    ideal: Duration,
    previous: Duration,
    duration: Duration,
    cues: &[Cue],
) -> Duration {
    let fits = |edge: &Duration| previous < *edge && *edge < duration;

    let Some(cue) = containing_cue(cues, ideal) else {
        return ideal.clamp(previous, duration);
    };

    let (nearer, farther) = if ideal - cue.start <= cue.end - ideal {
        (cue.start, cue.end)
    } else {
        (cue.end, cue.start)
    };

    [nearer, farther]
        .into_iter()
        .find(fits)
        .unwrap_or_else(|| nearer.clamp(previous, duration))
}

/// Widen core window `i` by `overlap`, growing to the edges of any cue it cuts.
fn expanded_window(
    boundaries: &[Duration],
    i: usize,
    cues: &[Cue],
    overlap: Duration,
) -> Result<(Duration, Duration)> {
    let duration = boundaries[boundaries.len() - 1];

    let mut range_start = boundaries[i].saturating_sub(overlap);
    let mut range_end = boundaries[i + 1].saturating_add(overlap).min(duration);

    if let Some(cue) = containing_cue(cues, range_start) {
        range_start = cue.start;
    }
    if let Some(cue) = containing_cue(cues, range_end) {
        range_end = cue.end;
    }

    // Only the immediate neighbours' core windows may be shared
    let lower_limit = boundaries[i.saturating_sub(1)];
    let upper_limit = boundaries.get(i + 2).copied().unwrap_or(duration);

    if range_start < lower_limit || range_end > upper_limit {
        return Err(PlanError::OverlapTooLarge {
            segment: i + 1,
            overlap,
        });
    }

    Ok((range_start, range_end))
}

/// The cue whose span strictly contains `t`, if any
fn containing_cue(cues: &[Cue], t: Duration) -> Option<&Cue> {
    let after = cues.partition_point(|cue| cue.start < t);
    after
        .checked_sub(1)
        .map(|i| &cues[i])
        .filter(|cue| cue.contains(t))
}
