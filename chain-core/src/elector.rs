//! Alarm elector (§4.2): picks one `traceId` per host and returns that
//! trace's full alarm membership.

use std::collections::HashMap;

use crate::model::{EventId, RawAlarm, Severity, TraceId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
struct SeverityCounts {
    high: u32,
    medium: u32,
    low: u32,
}

impl SeverityCounts {
    fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

/// Elect a `traceId` for one host's candidate alarms and return the full
/// membership of the elected group.
///
/// Election priority (spec.md §4.2):
/// 1. If `has_association` and some alarm's `eventId == associated_event_id`,
///    select that alarm's `traceId`.
/// 2. Otherwise group by `traceId`; select the group with the
///    lexicographically largest `(highCount, mediumCount, lowCount)` tuple,
///    breaking ties by earliest `timestamp` in the group (Open Question 2,
///    spec.md §9: the source does not name the comparison field precisely;
///    this implementation uses `timestamp` as the alarm's `startTime`).
///
/// Returns an empty vec if `alarms` is empty (spec.md §7: "Input empty" is
/// not exceptional — the caller logs and that host simply contributes
/// nothing).
pub fn elect(
    alarms: &[RawAlarm],
    associated_event_id: Option<&EventId>,
    has_association: bool,
) -> Vec<RawAlarm> {
    if alarms.is_empty() {
        return Vec::new();
    }

    let elected_trace = if has_association {
        associated_event_id.and_then(|eid| {
            alarms
                .iter()
                .find(|a| &a.event_id == eid)
                .map(|a| a.trace_id.clone())
        })
    } else {
        None
    };

    let elected_trace = elected_trace.unwrap_or_else(|| elect_by_severity_tuple(alarms));

    alarms
        .iter()
        .filter(|a| a.trace_id == elected_trace)
        .cloned()
        .collect()
}

fn elect_by_severity_tuple(alarms: &[RawAlarm]) -> TraceId {
    let mut groups: HashMap<TraceId, (SeverityCounts, i64)> = HashMap::new();

    for alarm in alarms {
        let entry = groups
            .entry(alarm.trace_id.clone())
            .or_insert((SeverityCounts::default(), i64::MAX));
        entry.0.bump(alarm.severity);
        entry.1 = entry.1.min(alarm.timestamp);
    }

    groups
        .into_iter()
        .max_by(|(_, (counts_a, start_a)), (_, (counts_b, start_b))| {
            counts_a
                .cmp(counts_b)
                .then(start_b.cmp(start_a)) // earliest start wins, so reverse for max_by
        })
        .map(|(trace_id, _)| trace_id)
        .expect("alarms is non-empty, so at least one group exists")
}
