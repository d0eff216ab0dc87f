//! Turns a list of detected shot events into a merged, non-overlapping set of
//! clip ranges.

mod error;

pub use error::{PlannerError, PlannerResult};

use hoop_models::ShotEvent;

/// Inclusive-exclusive clip range in integer seconds, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRange {
    pub start: u32,
    pub end: u32,
}

impl ClipRange {
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Parameters controlling how make events become clip windows.
#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    pub clip_duration: u32,
    pub pre_roll: u32,
    pub merge_gap: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            clip_duration: 5,
            pre_roll: 1,
            merge_gap: 0,
        }
    }
}

/// Build clip ranges from a job's shot events, following `ClipPlanner`'s
/// filter → window → sort → sweep-merge algorithm.
///
/// Events flagged `deleted`, hidden (`show = false`), or not a make are
/// dropped before windowing. Timestamps at or beyond `duration_sec` (when
/// known) are ignored.
pub fn plan_clips(
    events: &[ShotEvent],
    config: PlannerConfig,
    duration_sec: Option<u32>,
) -> Vec<ClipRange> {
    let mut windows: Vec<ClipRange> = events
        .iter()
        .filter(|e| e.is_make())
        .filter(|e| duration_sec.map_or(true, |d| e.timestamp_start < d))
        .map(|e| {
            let start = e.timestamp_start.saturating_sub(config.pre_roll);
            ClipRange {
                start,
                end: start + config.clip_duration,
            }
        })
        .collect();

    windows.sort_by_key(|w| w.start);
    merge_sweep(windows, config.merge_gap)
}

/// Sweep-merge: hold a current window, extend it while the next window
/// starts within `merge_gap` of its end, otherwise emit and start fresh.
fn merge_sweep(windows: Vec<ClipRange>, merge_gap: u32) -> Vec<ClipRange> {
    let mut merged = Vec::with_capacity(windows.len());
    let mut iter = windows.into_iter();

    let Some(mut current) = iter.next() else {
        return merged;
    };

    for next in iter {
        if next.start <= current.end + merge_gap {
            current.end = current.end.max(next.end);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoop_models::ShotOutcome;

    fn make_event(id: u32, t: u32) -> ShotEvent {
        ShotEvent {
            id,
            timestamp_start: t,
            timestamp_end: t,
            outcome: ShotOutcome::Make,
            subject: None,
            shot_type: None,
            shot_location: None,
            show: true,
            deleted: false,
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(plan_clips(&[], PlannerConfig::default(), None).is_empty());
    }

    #[test]
    fn single_event_at_zero_clips_from_zero() {
        let events = vec![make_event(1, 0)];
        let ranges = plan_clips(&events, PlannerConfig::default(), None);
        assert_eq!(ranges, vec![ClipRange { start: 0, end: 5 }]);
    }

    #[test]
    fn adjacent_makes_merge_into_one_window() {
        let events = vec![make_event(1, 10), make_event(2, 11), make_event(3, 30)];
        let config = PlannerConfig {
            clip_duration: 5,
            pre_roll: 1,
            merge_gap: 0,
        };
        let ranges = plan_clips(&events, config, None);
        assert_eq!(
            ranges,
            vec![
                ClipRange { start: 9, end: 15 },
                ClipRange { start: 29, end: 34 },
            ]
        );
    }

    #[test]
    fn non_make_events_are_filtered() {
        let mut miss = make_event(1, 5);
        miss.outcome = ShotOutcome::Miss;
        let events = vec![miss, make_event(2, 20)];
        let ranges = plan_clips(&events, PlannerConfig::default(), None);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start, 19);
    }

    #[test]
    fn hidden_and_deleted_events_are_filtered() {
        let mut hidden = make_event(1, 5);
        hidden.show = false;
        let mut deleted = make_event(2, 20);
        deleted.deleted = true;
        let ranges = plan_clips(&[hidden, deleted], PlannerConfig::default(), None);
        assert!(ranges.is_empty());
    }

    #[test]
    fn timestamps_beyond_known_duration_are_ignored() {
        let events = vec![make_event(1, 5), make_event(2, 500)];
        let ranges = plan_clips(&events, PlannerConfig::default(), Some(100));
        assert_eq!(ranges.len(), 1);
    }

    #[test]
    fn output_ranges_are_strictly_ordered_and_non_overlapping() {
        let events = vec![make_event(1, 0), make_event(2, 50), make_event(3, 100)];
        let config = PlannerConfig {
            clip_duration: 5,
            pre_roll: 1,
            merge_gap: 0,
        };
        let ranges = plan_clips(&events, config, None);
        for pair in ranges.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
        for r in &ranges {
            assert!(r.len() >= config.clip_duration);
        }
    }
}
