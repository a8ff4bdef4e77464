/// Property-based tests for seeding and bracket progression using proptest
///
/// These tests check bracket sizing, bye placement and seed separation for
/// every field size the bracket supports, and play random brackets through to
/// a champion.
use proptest::prelude::*;
use std::collections::HashSet;
use zonecup::bracket::{
    Bracket, MatchSlot, MatchStatus, RoundName, SeedPlan, Slot, ZoneRanking, build, seed,
    seeding_order,
};
use zonecup::registration::EntrantId;
use zonecup::zone::Standing;

// A single zone whose standings rank entrants 1..=n in order
fn single_zone(n: usize) -> Vec<ZoneRanking> {
    let standings = (1..=n)
        .map(|i| Standing {
            entrant_id: i as EntrantId,
            position: i as u32,
            played: 0,
            wins: 0,
            ties: 0,
            losses: 0,
            points: (n - i) as u32,
            games_for: 0,
            games_against: 0,
            differential: 0,
        })
        .collect();

    vec![ZoneRanking {
        zone_name: "A".to_string(),
        standings,
    }]
}

fn plan_for(n: usize) -> SeedPlan {
    seed(&single_zone(n)).unwrap()
}

// Position of a seed's first-round match
fn first_round_match(bracket_size: usize, seed: u32) -> usize {
    seeding_order(bracket_size)
        .iter()
        .position(|s| *s == seed)
        .unwrap()
        / 2
}

// Play every open match round by round with the given scores
fn play_out(bracket: &mut Bracket, scores: &[(u32, u32)]) {
    let rounds: Vec<RoundName> = bracket.rounds().to_vec();
    let mut next_score = scores.iter().cycle();

    for round in rounds {
        for position in 0..round.match_count() {
            let slot = MatchSlot::new(round, position as u32);
            if bracket.get(slot).unwrap().status() != MatchStatus::Pending {
                continue;
            }
            let (a, b) = *next_score.next().unwrap();
            let b = if a == b { b + 1 } else { b };

            bracket.start(slot, "Court 1").unwrap();
            bracket.record_result(slot, a, b).unwrap();
        }
    }
}

proptest! {
    #[test]
    fn test_bracket_size_is_next_power_of_two(n in 1usize..=32) {
        let plan = plan_for(n);

        prop_assert_eq!(plan.bracket_size, n.next_power_of_two());
        prop_assert_eq!(plan.byes, plan.bracket_size - n);
        prop_assert_eq!(plan.seeds.len(), n);
        prop_assert!(plan.bracket_size / 2 < n);
    }

    #[test]
    fn test_only_top_seeds_get_byes(n in 1usize..=32) {
        let plan = plan_for(n);

        for s in &plan.seeds {
            prop_assert_eq!(s.has_bye, (s.seed as usize) <= plan.byes);
        }

        if plan.bracket_size >= 2 {
            let bracket = build(&plan.seeds, plan.bracket_size).unwrap();
            let first_round = &bracket.matches()[..plan.bracket_size / 2];

            let bye_winners: HashSet<EntrantId> = first_round
                .iter()
                .filter(|m| m.is_bye_resolved())
                .filter_map(|m| m.winner().and_then(|w| w.entrant()))
                .collect();
            let expected: HashSet<EntrantId> = plan
                .seeds
                .iter()
                .filter(|s| s.has_bye)
                .map(|s| s.entrant_id)
                .collect();

            prop_assert_eq!(bye_winners, expected);
        }
    }

    #[test]
    fn test_top_two_seeds_in_opposite_halves(n in 4usize..=32) {
        let size = n.next_power_of_two();
        let half = size / 4;

        prop_assert!(first_round_match(size, 1) < half);
        prop_assert!(first_round_match(size, 2) >= half);
    }

    #[test]
    fn test_random_play_crowns_one_entrant(
        n in 2usize..=32,
        scores in prop::collection::vec((0u32..8, 0u32..8), 1..40),
    ) {
        let plan = plan_for(n);
        let mut bracket = build(&plan.seeds, plan.bracket_size).unwrap();

        play_out(&mut bracket, &scores);

        let champion = bracket.champion();
        prop_assert!(champion.is_some());
        prop_assert!((1..=n as EntrantId).contains(&champion.unwrap()));

        // Every match is decided and no entrant appears twice in a round
        let mut offset = 0;
        for round in bracket.rounds() {
            let matches = &bracket.matches()[offset..offset + round.match_count()];
            let mut seen = HashSet::new();
            for m in matches {
                prop_assert_eq!(m.status(), MatchStatus::Finished);
                for side in [m.side_a(), m.side_b()] {
                    if let Slot::Entrant(id) = side {
                        prop_assert!(seen.insert(id));
                    }
                }
            }
            offset += round.match_count();
        }
    }
}
