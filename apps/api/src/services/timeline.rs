//! Placement validation against a player's timeline
//!
//! Timelines are sorted ascending by release year and only the year takes
//! part in comparisons, so same-year cards compare equal.

use std::ops::RangeInclusive;

use crate::models::{Card, TiePolicy};

/// Outcome of judging a proposed index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub correct: bool,
    /// Where the card lands if correct; the correct position otherwise
    pub final_index: usize,
    /// Every index that would have been accepted
    pub accepted: RangeInclusive<usize>,
}

/// First index whose year is not less than `year`
pub fn lower_bound(timeline: &[Card], year: i32) -> usize {
    timeline.partition_point(|c| c.year() < year)
}

/// First index whose year is greater than `year`
pub fn upper_bound(timeline: &[Card], year: i32) -> usize {
    timeline.partition_point(|c| c.year() <= year)
}

/// Indices accepted for a card of `year` under `policy`
///
/// Strict accepts only the lower bound. Lenient accepts every slot
/// between and around same-year cards, so `k` ties give `k + 1` slots.
pub fn acceptance_range(timeline: &[Card], year: i32, policy: TiePolicy) -> RangeInclusive<usize> {
    let left = lower_bound(timeline, year);
    match policy {
        TiePolicy::Strict => left..=left,
        TiePolicy::Lenient => left..=upper_bound(timeline, year),
    }
}

/// Judge a placement of `card` at `chosen`
pub fn judge(timeline: &[Card], card: &Card, chosen: usize, policy: TiePolicy) -> Placement {
    let accepted = acceptance_range(timeline, card.year(), policy);
    let correct = accepted.contains(&chosen);
    let final_index = chosen.clamp(*accepted.start(), *accepted.end());

    Placement {
        correct,
        final_index,
        accepted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatePrecision, ReleaseDate};
    use chrono::NaiveDate;
    use rstest::rstest;

    fn timeline(years: &[i32]) -> Vec<Card> {
        years
            .iter()
            .enumerate()
            .map(|(i, year)| Card {
                track_id: format!("t{}", i),
                uri: format!("spotify:track:t{}", i),
                name: format!("Track {}", i),
                artist: "Artist".to_string(),
                album: None,
                cover_url: None,
                release: ReleaseDate {
                    date: NaiveDate::from_ymd_opt(*year, 3, 14).unwrap(),
                    precision: DatePrecision::Day,
                },
            })
            .collect()
    }

    fn card(year: i32) -> Card {
        timeline(&[year]).remove(0)
    }

    #[rstest]
    #[case(&[], 1990, 0)]
    #[case(&[1980], 1970, 0)]
    #[case(&[1980], 1990, 1)]
    #[case(&[1970, 1980, 1990], 1985, 2)]
    #[case(&[1970, 1980, 1980, 1990], 1980, 1)]
    #[case(&[1970, 1980, 1990], 2000, 3)]
    fn test_strict_index_is_lower_bound(
        #[case] years: &[i32],
        #[case] year: i32,
        #[case] expected: usize,
    ) {
        let timeline = timeline(years);
        assert_eq!(
            acceptance_range(&timeline, year, TiePolicy::Strict),
            expected..=expected
        );
        assert!(judge(&timeline, &card(year), expected, TiePolicy::Strict).correct);
    }

    #[rstest]
    #[case(&[1970, 1980, 1990], 1980, 1, 2)]
    #[case(&[1980, 1980, 1980], 1980, 0, 3)]
    #[case(&[1970, 1980, 1980, 1990], 1980, 1, 3)]
    #[case(&[1970, 1990], 1980, 1, 1)]
    fn test_lenient_range_width_is_ties_plus_one(
        #[case] years: &[i32],
        #[case] year: i32,
        #[case] left: usize,
        #[case] right: usize,
    ) {
        let timeline = timeline(years);
        let range = acceptance_range(&timeline, year, TiePolicy::Lenient);
        let ties = years.iter().filter(|y| **y == year).count();

        assert_eq!(range, left..=right);
        assert_eq!(right - left, ties);
        for index in range {
            assert!(judge(&timeline, &card(year), index, TiePolicy::Lenient).correct);
        }
    }

    #[test]
    fn test_empty_timeline_accepts_only_zero() {
        let placement = judge(&[], &card(1999), 0, TiePolicy::Lenient);
        assert!(placement.correct);
        assert_eq!(placement.accepted, 0..=0);

        let miss = judge(&[], &card(1999), 1, TiePolicy::Lenient);
        assert!(!miss.correct);
        assert_eq!(miss.final_index, 0);
    }

    #[test]
    fn test_strict_rejects_slot_after_tie() {
        let timeline = timeline(&[1970, 1980, 1990]);
        let placement = judge(&timeline, &card(1980), 2, TiePolicy::Strict);
        assert!(!placement.correct);
        assert_eq!(placement.final_index, 1);
    }

    #[test]
    fn test_lenient_out_of_range_clamps_to_nearest_edge() {
        let timeline = timeline(&[1960, 1970, 1980, 1980, 1990, 2000]);

        let low = judge(&timeline, &card(1980), 0, TiePolicy::Lenient);
        assert!(!low.correct);
        assert_eq!(low.final_index, 2);

        let high = judge(&timeline, &card(1980), 6, TiePolicy::Lenient);
        assert!(!high.correct);
        assert_eq!(high.final_index, 4);
    }

    #[test]
    fn test_same_year_different_dates_compare_equal() {
        let mut timeline = timeline(&[1980]);
        timeline[0].release.date = NaiveDate::from_ymd_opt(1980, 12, 31).unwrap();
        let mut early = card(1980);
        early.release.date = NaiveDate::from_ymd_opt(1980, 1, 1).unwrap();

        let placement = judge(&timeline, &early, 1, TiePolicy::Lenient);
        assert!(placement.correct);
    }
}
