//! Zone standings to bracket seeds.

use std::collections::HashSet;

use super::models::{Seed, SeedPlan};
use crate::errors::{TournamentError, TournamentResult};
use crate::tournament::MAX_BRACKET_ENTRANTS;
use crate::zone::Standing;

/// Final standings of one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRanking {
    pub zone_name: String,
    /// Ranked best first, as produced by the standings calculator
    pub standings: Vec<Standing>,
}

/// Convert zone standings into an ordered seed list.
///
/// Seeds are handed out level by level: every zone winner, then every
/// runner-up, and so on. Inside a level, zones are compared by their entrant's
/// (points, differential, games for), best first, and then by zone name.
/// Levels a smaller zone does not reach are skipped for that zone.
///
/// # Errors
///
/// * `TournamentError::NoEntrants` - No zone has any entrant
/// * `TournamentError::InvalidBracket` - An entrant appears in two zones
/// * `TournamentError::TooManyEntrants` - More entrants than the largest bracket
pub fn seed(zones: &[ZoneRanking]) -> TournamentResult<SeedPlan> {
    let entrant_count: usize = zones.iter().map(|z| z.standings.len()).sum();
    if entrant_count == 0 {
        return Err(TournamentError::NoEntrants);
    }

    if entrant_count > MAX_BRACKET_ENTRANTS {
        return Err(TournamentError::TooManyEntrants {
            max: MAX_BRACKET_ENTRANTS,
            current: entrant_count,
        });
    }

    let mut seen = HashSet::with_capacity(entrant_count);
    for standing in zones.iter().flat_map(|z| &z.standings) {
        if !seen.insert(standing.entrant_id) {
            return Err(TournamentError::InvalidBracket(format!(
                "entrant {} is ranked in more than one zone",
                standing.entrant_id
            )));
        }
    }

    let bracket_size = entrant_count.next_power_of_two();
    let byes = bracket_size - entrant_count;
    let deepest = zones.iter().map(|z| z.standings.len()).max().unwrap_or(0);

    let mut seeds = Vec::with_capacity(entrant_count);
    for level in 0..deepest {
        let mut tier: Vec<(&str, &Standing)> = zones
            .iter()
            .filter_map(|z| z.standings.get(level).map(|s| (z.zone_name.as_str(), s)))
            .collect();

        tier.sort_by(|(zone_a, a), (zone_b, b)| {
            b.ranking_key()
                .cmp(&a.ranking_key())
                .then_with(|| zone_a.cmp(zone_b))
        });

        for (zone_name, standing) in tier {
            let number = seeds.len() as u32 + 1;
            seeds.push(Seed {
                seed: number,
                entrant_id: standing.entrant_id,
                zone_name: zone_name.to_string(),
                zone_position: level as u32 + 1,
                has_bye: (number as usize) <= byes,
            });
        }
    }

    log::debug!(
        "Seeded {} entrants from {} zones: bracket size {}, {} byes",
        entrant_count,
        zones.len(),
        bracket_size,
        byes
    );

    Ok(SeedPlan {
        seeds,
        bracket_size,
        byes,
    })
}
