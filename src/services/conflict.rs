use tracing::debug;

use crate::models::schedule::{LAST_MINUTE_OF_DAY, MINUTES_PER_DAY};

const MAX_SHIFT_ROUNDS: u32 = 10;

/// A proposed same-day placement entering conflict resolution. Null-start
/// suggestions never reach this stage; they pass through as unscheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedSlot {
    pub id: String,
    pub start_minute: u32,
    pub end_minute: u32,
    pub confidence: f64,
}

impl ProposedSlot {
    fn overlaps(&self, other: &ProposedSlot) -> bool {
        // Open intersection: touching endpoints do not conflict.
        self.start_minute < other.end_minute && self.end_minute > other.start_minute
    }
}

/// Greedy single-pass placement: sort by start (stable), accept in order,
/// and shift a candidate past any accepted slot that beats it on confidence.
/// Resolution is one-directional; a candidate with greater-or-equal
/// confidence keeps its place even if it still overlaps something accepted
/// earlier. Each candidate gets a bounded number of shift rounds, after
/// which it is accepted as-is.
///
/// Output order is unspecified relative to the input; callers re-associate
/// by id.
pub fn resolve(slots: Vec<ProposedSlot>) -> Vec<ProposedSlot> {
    let mut sorted = slots;
    sorted.sort_by_key(|slot| slot.start_minute);

    let mut accepted: Vec<ProposedSlot> = Vec::with_capacity(sorted.len());

    for slot in sorted {
        let mut current = slot;
        let mut rounds = 0;

        'rounds: while rounds < MAX_SHIFT_ROUNDS {
            rounds += 1;

            for existing in &accepted {
                if !current.overlaps(existing) {
                    continue;
                }

                if current.confidence < existing.confidence {
                    let duration = current.end_minute - current.start_minute;
                    current.start_minute = existing.end_minute;
                    current.end_minute = current.start_minute + duration;

                    if current.end_minute >= MINUTES_PER_DAY {
                        // Duration is sacrificed at the end of the day.
                        current.end_minute = LAST_MINUTE_OF_DAY;
                    }

                    debug!(
                        target: "app::schedule::conflict",
                        id = %current.id,
                        start = current.start_minute,
                        end = current.end_minute,
                        "shifted lower-confidence slot"
                    );

                    // Re-check the shifted slot against the whole set.
                    continue 'rounds;
                }

                // Higher or equal confidence stays put; the residual overlap
                // is tolerated.
                break 'rounds;
            }

            break;
        }

        accepted.push(current);
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: &str, start: u32, end: u32, confidence: f64) -> ProposedSlot {
        ProposedSlot {
            id: id.to_string(),
            start_minute: start,
            end_minute: end,
            confidence,
        }
    }

    fn find<'a>(slots: &'a [ProposedSlot], id: &str) -> &'a ProposedSlot {
        slots.iter().find(|slot| slot.id == id).expect("slot by id")
    }

    #[test]
    fn non_overlapping_slots_are_untouched() {
        let resolved = resolve(vec![
            slot("a", 540, 600, 0.9),
            slot("b", 600, 660, 0.8),
            slot("c", 720, 780, 0.4),
        ]);

        assert_eq!(find(&resolved, "a").start_minute, 540);
        assert_eq!(find(&resolved, "b").start_minute, 600);
        assert_eq!(find(&resolved, "c").start_minute, 720);
    }

    #[test]
    fn lower_confidence_slot_shifts_past_the_winner() {
        let resolved = resolve(vec![
            slot("gym", 540, 600, 0.9),
            slot("call", 555, 615, 0.7),
        ]);

        let gym = find(&resolved, "gym");
        let call = find(&resolved, "call");
        assert_eq!((gym.start_minute, gym.end_minute), (540, 600));
        assert_eq!((call.start_minute, call.end_minute), (600, 660));
        assert!(!gym.overlaps(call));
    }

    #[test]
    fn cascade_of_shifts_preserves_durations() {
        let resolved = resolve(vec![
            slot("a", 600, 660, 0.9),
            slot("b", 610, 640, 0.8),
            slot("c", 620, 650, 0.7),
        ]);

        let a = find(&resolved, "a");
        let b = find(&resolved, "b");
        let c = find(&resolved, "c");
        assert_eq!((a.start_minute, a.end_minute), (600, 660));
        assert_eq!((b.start_minute, b.end_minute), (660, 690));
        assert_eq!((c.start_minute, c.end_minute), (690, 720));
    }

    #[test]
    fn equal_confidence_keeps_both_in_place() {
        let resolved = resolve(vec![
            slot("a", 540, 600, 0.8),
            slot("b", 570, 630, 0.8),
        ]);

        assert_eq!(find(&resolved, "a").start_minute, 540);
        assert_eq!(find(&resolved, "b").start_minute, 570);
    }

    #[test]
    fn higher_confidence_later_slot_does_not_move() {
        // The earlier-starting slot was accepted first; the later one wins
        // on confidence and keeps its place, so the overlap survives. This
        // is the documented one-directional limitation.
        let resolved = resolve(vec![
            slot("weak", 540, 620, 0.3),
            slot("strong", 560, 640, 0.9),
        ]);

        assert_eq!(find(&resolved, "weak").start_minute, 540);
        assert_eq!(find(&resolved, "strong").start_minute, 560);
    }

    #[test]
    fn lower_confidence_pairs_never_keep_overlap() {
        // Property from the design: for any pair where the lower-confidence
        // slot sorts after the higher-confidence one, no overlap remains.
        let resolved = resolve(vec![
            slot("a", 500, 560, 0.9),
            slot("b", 510, 570, 0.8),
            slot("c", 520, 580, 0.7),
            slot("d", 530, 590, 0.6),
        ]);

        for first in &resolved {
            for second in &resolved {
                if first.id == second.id {
                    continue;
                }
                if second.confidence < first.confidence
                    && second.start_minute >= first.start_minute
                {
                    assert!(
                        !first.overlaps(second),
                        "{} and {} still overlap",
                        first.id,
                        second.id
                    );
                }
            }
        }
    }

    #[test]
    fn shift_past_midnight_clamps_end_minute() {
        let resolved = resolve(vec![
            slot("anchor", 1380, 1430, 0.9),
            slot("late", 1390, 1435, 0.5),
        ]);

        let late = find(&resolved, "late");
        assert_eq!(late.start_minute, 1430);
        assert_eq!(late.end_minute, 1439);
    }

    #[test]
    fn ties_on_start_keep_input_order() {
        let resolved = resolve(vec![
            slot("first", 540, 600, 0.5),
            slot("second", 540, 600, 0.9),
        ]);

        // "first" is accepted before "second"; "second" wins on confidence
        // and stays, "first" was already accepted untouched.
        assert_eq!(find(&resolved, "first").start_minute, 540);
        assert_eq!(find(&resolved, "second").start_minute, 540);
    }

    #[test]
    fn bounded_rounds_terminate_with_slot_accepted_as_is() {
        // Twelve nested anchors force one shift per round; the candidate
        // runs out of rounds mid-chain and is accepted still overlapping.
        let mut slots: Vec<ProposedSlot> = (0..12u32)
            .map(|i| slot(&format!("anchor{i}"), i, 200 + i * 100, 0.9))
            .collect();
        slots.push(slot("pushed", 50, 60, 0.1));

        let resolved = resolve(slots);
        assert_eq!(resolved.len(), 13);

        let pushed = find(&resolved, "pushed");
        // Ten shifts land it at the end of anchor9; anchors 10 and 11 still
        // overlap it, which the bound tolerates.
        assert_eq!(pushed.start_minute, 1100);
        assert_eq!(pushed.end_minute, 1110);
        assert!(pushed.overlaps(find(&resolved, "anchor10")));
    }
}
