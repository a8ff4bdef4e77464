//! Zone draw and round-robin scheduling.

use super::models::{Fixture, ZoneDraft};
use crate::registration::EntrantId;

/// Name used for the single table of a round-robin-only tournament
pub const LEAGUE_ZONE_NAME: &str = "LEAGUE";

/// Entrant as seen by the draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawEntrant {
    pub entrant_id: EntrantId,
    /// Couple strength: sum of both players' rankings
    pub strength: i64,
}

/// Spreadsheet-style zone name: 0 → "A", 25 → "Z", 26 → "AA"
pub fn zone_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Split entrants into zones of roughly `zone_size` members.
///
/// `entrants` must be in registration order. Couples are dealt by strength in
/// snake order (A, B, C, C, B, A, …) so zone sizes differ by at most one.
/// Each zone lists its members back in registration order.
///
/// # Arguments
///
/// * `entrants` - Active entrants, registration order
/// * `zone_size` - Target members per zone (at least 2)
///
/// # Returns
///
/// * `Vec<ZoneDraft>` - One draft per zone, empty when there are no entrants
pub fn draw_zones(entrants: &[DrawEntrant], zone_size: usize) -> Vec<ZoneDraft> {
    if entrants.is_empty() {
        return Vec::new();
    }

    let zone_size = zone_size.max(2);
    let zone_count = entrants.len().div_ceil(zone_size);

    let mut by_strength: Vec<(usize, &DrawEntrant)> = entrants.iter().enumerate().collect();
    by_strength.sort_by(|(ia, a), (ib, b)| b.strength.cmp(&a.strength).then(ia.cmp(ib)));

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); zone_count];
    for (pick, (registration_index, _)) in by_strength.into_iter().enumerate() {
        let pass = pick / zone_count;
        let offset = pick % zone_count;
        let zone = if pass % 2 == 0 {
            offset
        } else {
            zone_count - 1 - offset
        };
        buckets[zone].push(registration_index);
    }

    buckets
        .into_iter()
        .enumerate()
        .map(|(i, mut members)| {
            members.sort_unstable();
            let entrant_ids: Vec<EntrantId> =
                members.iter().map(|&m| entrants[m].entrant_id).collect();
            let fixtures = round_robin(&entrant_ids);
            ZoneDraft {
                name: zone_name(i),
                entrant_ids,
                fixtures,
            }
        })
        .collect()
}

/// Single table holding every entrant
pub fn league(entrant_ids: &[EntrantId]) -> ZoneDraft {
    ZoneDraft {
        name: LEAGUE_ZONE_NAME.to_string(),
        entrant_ids: entrant_ids.to_vec(),
        fixtures: round_robin(entrant_ids),
    }
}

/// Circle-method schedule: every pair meets exactly once.
///
/// With `k` members there are `k - 1` rounds for even `k` and `k` rounds for
/// odd `k` (one member sits out each round).
pub fn round_robin(members: &[EntrantId]) -> Vec<Fixture> {
    if members.len() < 2 {
        return Vec::new();
    }

    let mut ring: Vec<Option<EntrantId>> = members.iter().copied().map(Some).collect();
    if ring.len() % 2 == 1 {
        ring.push(None);
    }

    let n = ring.len();
    let mut fixtures = Vec::with_capacity(members.len() * (members.len() - 1) / 2);

    for round in 1..n as u32 {
        for i in 0..n / 2 {
            if let (Some(a), Some(b)) = (ring[i], ring[n - 1 - i]) {
                fixtures.push(Fixture {
                    round,
                    entrant_a: a,
                    entrant_b: b,
                });
            }
        }
        // First member stays put, the rest rotate
        ring[1..].rotate_right(1);
    }

    fixtures
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn field(strengths: &[i64]) -> Vec<DrawEntrant> {
        strengths
            .iter()
            .enumerate()
            .map(|(i, &strength)| DrawEntrant {
                entrant_id: i as EntrantId + 1,
                strength,
            })
            .collect()
    }

    #[test]
    fn test_zone_names() {
        assert_eq!(zone_name(0), "A");
        assert_eq!(zone_name(2), "C");
        assert_eq!(zone_name(25), "Z");
        assert_eq!(zone_name(26), "AA");
        assert_eq!(zone_name(27), "AB");
    }

    #[test]
    fn test_zone_sizes_differ_by_at_most_one() {
        for n in 1..=32usize {
            for zone_size in 2..=5 {
                let strengths: Vec<i64> = (0..n as i64).collect();
                let zones = draw_zones(&field(&strengths), zone_size);

                assert_eq!(zones.len(), n.div_ceil(zone_size));
                let sizes: Vec<usize> = zones.iter().map(|z| z.entrant_ids.len()).collect();
                let max = *sizes.iter().max().unwrap();
                let min = *sizes.iter().min().unwrap();
                assert!(max - min <= 1, "n={n} size={zone_size} sizes={sizes:?}");
                assert_eq!(sizes.iter().sum::<usize>(), n);
            }
        }
    }

    #[test]
    fn test_snake_deal_spreads_strong_couples() {
        // Strength order: 6, 5, 4, 3, 2, 1 (entrant ids 1..=6)
        let zones = draw_zones(&field(&[60, 50, 40, 30, 20, 10]), 3);

        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].name, "A");
        // A takes picks 1, 4, 5; B takes picks 2, 3, 6
        assert_eq!(zones[0].entrant_ids, vec![1, 4, 5]);
        assert_eq!(zones[1].entrant_ids, vec![2, 3, 6]);
    }

    #[test]
    fn test_members_listed_in_registration_order() {
        let zones = draw_zones(&field(&[1, 2, 3, 4, 5, 6]), 3);
        for zone in &zones {
            let mut sorted = zone.entrant_ids.clone();
            sorted.sort_unstable();
            assert_eq!(zone.entrant_ids, sorted);
        }
    }

    #[test]
    fn test_equal_strength_falls_back_to_registration_order() {
        let zones = draw_zones(&field(&[0, 0, 0, 0]), 2);
        assert_eq!(zones[0].entrant_ids, vec![1, 4]);
        assert_eq!(zones[1].entrant_ids, vec![2, 3]);
    }

    #[test]
    fn test_round_robin_every_pair_once() {
        for k in 0..=9i64 {
            let members: Vec<EntrantId> = (1..=k).collect();
            let fixtures = round_robin(&members);

            let expected = (k * (k - 1) / 2).max(0) as usize;
            assert_eq!(fixtures.len(), expected, "k={k}");

            let pairs: HashSet<(EntrantId, EntrantId)> = fixtures
                .iter()
                .map(|f| (f.entrant_a.min(f.entrant_b), f.entrant_a.max(f.entrant_b)))
                .collect();
            assert_eq!(pairs.len(), expected);
            assert!(fixtures.iter().all(|f| f.entrant_a != f.entrant_b));
        }
    }

    #[test]
    fn test_round_robin_round_count() {
        let even = round_robin(&[1, 2, 3, 4]);
        assert_eq!(even.iter().map(|f| f.round).max(), Some(3));

        let odd = round_robin(&[1, 2, 3]);
        assert_eq!(odd.iter().map(|f| f.round).max(), Some(3));

        // Nobody plays twice in one round
        for round in 1..=3 {
            let mut seen = HashSet::new();
            for f in even.iter().filter(|f| f.round == round) {
                assert!(seen.insert(f.entrant_a));
                assert!(seen.insert(f.entrant_b));
            }
        }
    }

    #[test]
    fn test_league_holds_everyone() {
        let draft = league(&[3, 1, 2]);
        assert_eq!(draft.name, LEAGUE_ZONE_NAME);
        assert_eq!(draft.entrant_ids, vec![3, 1, 2]);
        assert_eq!(draft.fixtures.len(), 3);
    }

    #[test]
    fn test_empty_field() {
        assert!(draw_zones(&[], 3).is_empty());
    }
}
