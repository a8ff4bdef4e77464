//! Bracket construction from an ordered seed list.

use super::lifecycle::{Bracket, BracketMatch};
use super::models::{MatchSlot, RoundName, Seed, Side, Slot};
use crate::errors::{TournamentError, TournamentResult};
use crate::tournament::MAX_BRACKET_ENTRANTS;

/// Standard seeding table for a power-of-two bracket.
///
/// Built by repeatedly pairing every seed `s` with `2 * len + 1 - s`, so for
/// size 8 the order is `[1, 8, 4, 5, 2, 7, 3, 6]`. Adjacent entries meet in
/// round one; seeds 1 and 2 land in opposite halves.
pub fn seeding_order(bracket_size: usize) -> Vec<u32> {
    let mut order = vec![1u32];
    while order.len() < bracket_size {
        let len = order.len() as u32;
        order = order.iter().flat_map(|&s| [s, 2 * len + 1 - s]).collect();
    }
    order
}

/// Round names for a bracket size, earliest round first
pub fn round_names(bracket_size: usize) -> TournamentResult<Vec<RoundName>> {
    check_size(bracket_size)?;

    let mut rounds = Vec::new();
    let mut match_count = bracket_size / 2;
    while match_count >= 1 {
        let name = RoundName::for_match_count(match_count).ok_or_else(|| {
            TournamentError::InvalidBracket(format!("no round name for {match_count} matches"))
        })?;
        rounds.push(name);
        match_count /= 2;
    }
    Ok(rounds)
}

fn check_size(bracket_size: usize) -> TournamentResult<()> {
    if bracket_size == 0 || !bracket_size.is_power_of_two() {
        return Err(TournamentError::InvalidBracket(format!(
            "bracket size {bracket_size} is not a power of two"
        )));
    }
    if bracket_size > MAX_BRACKET_ENTRANTS {
        return Err(TournamentError::InvalidBracket(format!(
            "bracket size {bracket_size} exceeds {MAX_BRACKET_ENTRANTS}"
        )));
    }
    Ok(())
}

/// Empty arena for a bracket size: every match `Pending` with open sides and
/// its forward link filled in. Matches are stored round by round.
pub(super) fn skeleton(bracket_size: usize) -> TournamentResult<(Vec<RoundName>, Vec<BracketMatch>)> {
    let rounds = round_names(bracket_size)?;

    let mut matches = Vec::with_capacity(bracket_size.saturating_sub(1));
    let mut offset = 0;
    for (r, round) in rounds.iter().enumerate() {
        let count = round.match_count();
        let next_offset = offset + count;
        for position in 0..count {
            let next = (r + 1 < rounds.len()).then(|| {
                let side = if position % 2 == 0 { Side::A } else { Side::B };
                (next_offset + position / 2, side)
            });
            matches.push(BracketMatch::new(
                MatchSlot::new(*round, position as u32),
                Slot::Open,
                Slot::Open,
                next,
            ));
        }
        offset = next_offset;
    }

    Ok((rounds, matches))
}

/// Build the bracket for an ordered seed list.
///
/// Seeds past the entrant count become byes. Every bye match is resolved
/// before returning, cascading through later rounds when needed.
///
/// # Arguments
///
/// * `seeds` - Seeds 1..=N in order
/// * `bracket_size` - Power of two, at least N
///
/// # Errors
///
/// * `TournamentError::NoEntrants` - Empty seed list
/// * `TournamentError::InvalidBracket` - Bad size or seed numbering
pub fn build(seeds: &[Seed], bracket_size: usize) -> TournamentResult<Bracket> {
    if seeds.is_empty() {
        return Err(TournamentError::NoEntrants);
    }
    check_size(bracket_size)?;
    if bracket_size < seeds.len() {
        return Err(TournamentError::InvalidBracket(format!(
            "bracket size {bracket_size} cannot hold {} seeds",
            seeds.len()
        )));
    }
    for (i, seed) in seeds.iter().enumerate() {
        if seed.seed as usize != i + 1 {
            return Err(TournamentError::InvalidBracket(format!(
                "seed at position {} is numbered {}",
                i + 1,
                seed.seed
            )));
        }
    }

    if bracket_size == 1 {
        log::info!("Single entrant {} wins without play", seeds[0].entrant_id);
        return Ok(Bracket::from_parts(
            bracket_size,
            seeds.len(),
            Vec::new(),
            Vec::new(),
            Some(seeds[0].entrant_id),
        ));
    }

    let (rounds, mut matches) = skeleton(bracket_size)?;

    let slot_for = |seed: u32| -> Slot {
        seeds
            .get(seed as usize - 1)
            .map_or(Slot::Bye, |s| Slot::Entrant(s.entrant_id))
    };

    let order = seeding_order(bracket_size);
    for (m, pair) in matches.iter_mut().zip(order.chunks(2)) {
        m.seat(slot_for(pair[0]), slot_for(pair[1]));
    }

    let mut bracket = Bracket::from_parts(bracket_size, seeds.len(), rounds, matches, None);
    bracket.resolve_byes();

    log::info!(
        "Built {}-slot bracket for {} entrants ({} rounds)",
        bracket_size,
        seeds.len(),
        bracket.rounds().len()
    );

    Ok(bracket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::MatchStatus;
    use crate::registration::EntrantId;

    fn seeds(n: u32) -> Vec<Seed> {
        let size = (n as usize).next_power_of_two();
        let byes = size - n as usize;
        (1..=n)
            .map(|s| Seed {
                seed: s,
                entrant_id: 100 + s as EntrantId,
                zone_name: "A".to_string(),
                zone_position: s,
                has_bye: (s as usize) <= byes,
            })
            .collect()
    }

    #[test]
    fn test_seeding_order() {
        assert_eq!(seeding_order(1), vec![1]);
        assert_eq!(seeding_order(2), vec![1, 2]);
        assert_eq!(seeding_order(4), vec![1, 4, 2, 3]);
        assert_eq!(seeding_order(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
    }

    #[test]
    fn test_round_names_are_suffix_ending_in_final() {
        assert!(round_names(1).unwrap().is_empty());
        assert_eq!(round_names(2).unwrap(), vec![RoundName::Final]);
        assert_eq!(
            round_names(8).unwrap(),
            vec![RoundName::Quarterfinal, RoundName::Semifinal, RoundName::Final]
        );
        assert_eq!(round_names(32).unwrap().len(), 5);
        assert_eq!(round_names(32).unwrap()[0], RoundName::RoundOf32);
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(matches!(
            build(&seeds(3), 6),
            Err(TournamentError::InvalidBracket(_))
        ));
        assert!(matches!(
            build(&seeds(5), 4),
            Err(TournamentError::InvalidBracket(_))
        ));
        assert!(matches!(
            build(&seeds(3), 64),
            Err(TournamentError::InvalidBracket(_))
        ));
        assert!(matches!(build(&[], 4), Err(TournamentError::NoEntrants)));
    }

    #[test]
    fn test_six_entrants_top_two_seeds_skip_round_one() {
        let bracket = build(&seeds(6), 8).unwrap();

        let qf: Vec<_> = bracket
            .matches()
            .iter()
            .filter(|m| m.slot().round == RoundName::Quarterfinal)
            .collect();
        assert_eq!(qf.len(), 4);

        // 1 v bye, 4 v 5, 2 v bye, 3 v 6
        assert_eq!(qf[0].status(), MatchStatus::Finished);
        assert_eq!(qf[0].winner(), Some(Slot::Entrant(101)));
        assert_eq!(qf[0].court(), None);
        assert_eq!(qf[0].result(), None);
        assert_eq!(qf[1].status(), MatchStatus::Pending);
        assert_eq!(qf[2].status(), MatchStatus::Finished);
        assert_eq!(qf[2].winner(), Some(Slot::Entrant(102)));
        assert_eq!(qf[3].status(), MatchStatus::Pending);

        let sf0 = bracket.get(MatchSlot::new(RoundName::Semifinal, 0)).unwrap();
        assert_eq!(sf0.side_a(), Slot::Entrant(101));
        assert_eq!(sf0.side_b(), Slot::Open);
        let sf1 = bracket.get(MatchSlot::new(RoundName::Semifinal, 1)).unwrap();
        assert_eq!(sf1.side_a(), Slot::Entrant(102));
    }

    #[test]
    fn test_seeds_one_and_two_in_opposite_halves() {
        for n in 4..=32u32 {
            let size = (n as usize).next_power_of_two();
            let order = seeding_order(size);
            let pos1 = order.iter().position(|&s| s == 1).unwrap();
            let pos2 = order.iter().position(|&s| s == 2).unwrap();
            assert!(pos1 < size / 2 && pos2 >= size / 2, "n={n}");
        }
    }

    #[test]
    fn test_two_entrants_single_final() {
        let bracket = build(&seeds(2), 2).unwrap();
        assert_eq!(bracket.matches().len(), 1);
        let fin = &bracket.matches()[0];
        assert_eq!(fin.slot(), MatchSlot::new(RoundName::Final, 0));
        assert_eq!(fin.side_a(), Slot::Entrant(101));
        assert_eq!(fin.side_b(), Slot::Entrant(102));
        assert_eq!(fin.status(), MatchStatus::Pending);
    }

    #[test]
    fn test_single_entrant_is_champion() {
        let bracket = build(&seeds(1), 1).unwrap();
        assert!(bracket.matches().is_empty());
        assert_eq!(bracket.champion(), Some(101));
    }

    #[test]
    fn test_bye_chain_cascades() {
        // Two entrants in an 8-slot bracket: every early match is a bye
        let bracket = build(&seeds(2), 8).unwrap();

        let fin = bracket.get(MatchSlot::new(RoundName::Final, 0)).unwrap();
        assert_eq!(fin.side_a(), Slot::Entrant(101));
        assert_eq!(fin.side_b(), Slot::Entrant(102));
        assert_eq!(fin.status(), MatchStatus::Pending);
        assert!(
            bracket
                .matches()
                .iter()
                .filter(|m| m.slot().round != RoundName::Final)
                .all(|m| m.status() == MatchStatus::Finished)
        );
    }
}
