//! Bracket arena and the per-match state machine.
//!
//! A [`Bracket`] owns its matches in a flat arena stored round by round. Each
//! match knows the index of the match its winner feeds and which side it
//! lands on. Match state is only changed through the transition methods on
//! [`Bracket`]:
//!
//! ```text
//! PENDING ──start──▶ IN_PROGRESS ──record_result──▶ FINISHED
//!    │                    │                            │
//!    └──cancel──▶ CANCELED ◀──cancel──┘                │
//!                    │                                 │
//!                    └─reactivate─▶ PENDING     reactivate─▶ IN_PROGRESS
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::builder;
use super::models::{MatchResult, MatchSlot, RoundName, Side, Slot};
use crate::errors::{TournamentError, TournamentResult};
use crate::registration::EntrantId;
use crate::zone::check_scores;

/// Bracket match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    InProgress,
    Finished,
    Canceled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Finished => "finished",
            MatchStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = TournamentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "in_progress" => Ok(MatchStatus::InProgress),
            "finished" => Ok(MatchStatus::Finished),
            "canceled" => Ok(MatchStatus::Canceled),
            other => Err(TournamentError::Corrupt(format!(
                "unknown match status '{other}'"
            ))),
        }
    }
}

/// Match state. Court, result and winner only exist in the states that have them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchState {
    Pending,
    InProgress {
        court: String,
    },
    /// `result` is `None` when the match was decided by a bye
    Finished {
        court: Option<String>,
        result: Option<MatchResult>,
        winner: Slot,
    },
    Canceled {
        court: Option<String>,
    },
}

impl MatchState {
    pub fn status(&self) -> MatchStatus {
        match self {
            MatchState::Pending => MatchStatus::Pending,
            MatchState::InProgress { .. } => MatchStatus::InProgress,
            MatchState::Finished { .. } => MatchStatus::Finished,
            MatchState::Canceled { .. } => MatchStatus::Canceled,
        }
    }

    pub fn court(&self) -> Option<&str> {
        match self {
            MatchState::Pending => None,
            MatchState::InProgress { court } => Some(court.as_str()),
            MatchState::Finished { court, .. } | MatchState::Canceled { court } => {
                court.as_deref()
            }
        }
    }

    fn from_record(record: &BracketMatchRecord) -> TournamentResult<Self> {
        let corrupt = |why: &str| {
            TournamentError::Corrupt(format!("bracket match {}: {why}", record.slot))
        };

        match record.status {
            MatchStatus::Pending => {
                if record.court.is_some() || record.result.is_some() || record.winner.is_some() {
                    return Err(corrupt("pending match carries play data"));
                }
                Ok(MatchState::Pending)
            }
            MatchStatus::InProgress => {
                if record.result.is_some() || record.winner.is_some() {
                    return Err(corrupt("match in progress carries a result"));
                }
                let court = record
                    .court
                    .clone()
                    .ok_or_else(|| corrupt("match in progress has no court"))?;
                Ok(MatchState::InProgress { court })
            }
            MatchStatus::Finished => match record.winner {
                Some(winner) if winner.is_resolved() => Ok(MatchState::Finished {
                    court: record.court.clone(),
                    result: record.result,
                    winner,
                }),
                _ => Err(corrupt("finished match has no winner")),
            },
            MatchStatus::Canceled => {
                if record.result.is_some() || record.winner.is_some() {
                    return Err(corrupt("canceled match carries a result"));
                }
                Ok(MatchState::Canceled {
                    court: record.court.clone(),
                })
            }
        }
    }
}

/// One node of the bracket arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketMatch {
    slot: MatchSlot,
    side_a: Slot,
    side_b: Slot,
    state: MatchState,
    next: Option<(usize, Side)>,
}

impl BracketMatch {
    pub(super) fn new(
        slot: MatchSlot,
        side_a: Slot,
        side_b: Slot,
        next: Option<(usize, Side)>,
    ) -> Self {
        Self {
            slot,
            side_a,
            side_b,
            state: MatchState::Pending,
            next,
        }
    }

    pub(super) fn seat(&mut self, side_a: Slot, side_b: Slot) {
        self.side_a = side_a;
        self.side_b = side_b;
    }

    pub fn slot(&self) -> MatchSlot {
        self.slot
    }

    pub fn side_a(&self) -> Slot {
        self.side_a
    }

    pub fn side_b(&self) -> Slot {
        self.side_b
    }

    pub fn side(&self, side: Side) -> Slot {
        match side {
            Side::A => self.side_a,
            Side::B => self.side_b,
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn status(&self) -> MatchStatus {
        self.state.status()
    }

    pub fn court(&self) -> Option<&str> {
        self.state.court()
    }

    pub fn result(&self) -> Option<MatchResult> {
        match &self.state {
            MatchState::Finished { result, .. } => *result,
            _ => None,
        }
    }

    pub fn winner(&self) -> Option<Slot> {
        match &self.state {
            MatchState::Finished { winner, .. } => Some(*winner),
            _ => None,
        }
    }

    /// Both sides hold real entrants and the match has not started
    pub fn is_ready(&self) -> bool {
        self.status() == MatchStatus::Pending
            && self.side_a.entrant().is_some()
            && self.side_b.entrant().is_some()
    }

    /// Decided by a bye rather than played
    pub fn is_bye_resolved(&self) -> bool {
        matches!(self.state, MatchState::Finished { result: None, .. })
    }

    /// Flat storage form
    pub fn record(&self) -> BracketMatchRecord {
        BracketMatchRecord {
            slot: self.slot,
            side_a: self.side_a,
            side_b: self.side_b,
            status: self.status(),
            court: self.court().map(str::to_string),
            result: self.result(),
            winner: self.winner(),
        }
    }

    fn set_side(&mut self, side: Side, occupant: Slot) {
        match side {
            Side::A => self.side_a = occupant,
            Side::B => self.side_b = occupant,
        }
    }

    /// Finish a pending match that has a bye on either side
    fn settle_bye(&mut self) -> bool {
        if self.status() != MatchStatus::Pending
            || !self.side_a.is_resolved()
            || !self.side_b.is_resolved()
        {
            return false;
        }

        let winner = match (self.side_a, self.side_b) {
            (Slot::Bye, other) | (other, Slot::Bye) => other,
            _ => return false,
        };

        self.state = MatchState::Finished {
            court: None,
            result: None,
            winner,
        };
        true
    }

    fn invalid(&self, action: &'static str) -> TournamentError {
        TournamentError::InvalidTransition {
            slot: self.slot,
            action,
            from: self.status(),
        }
    }
}

/// Storage form of one bracket match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketMatchRecord {
    pub slot: MatchSlot,
    pub side_a: Slot,
    pub side_b: Slot,
    pub status: MatchStatus,
    pub court: Option<String>,
    pub result: Option<MatchResult>,
    pub winner: Option<Slot>,
}

/// Single-elimination bracket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bracket {
    bracket_size: usize,
    entrant_count: usize,
    rounds: Vec<RoundName>,
    matches: Vec<BracketMatch>,
    champion: Option<EntrantId>,
}

impl Bracket {
    pub(super) fn from_parts(
        bracket_size: usize,
        entrant_count: usize,
        rounds: Vec<RoundName>,
        matches: Vec<BracketMatch>,
        champion: Option<EntrantId>,
    ) -> Self {
        Self {
            bracket_size,
            entrant_count,
            rounds,
            matches,
            champion,
        }
    }

    /// Rebuild a bracket from stored match records
    ///
    /// The arena links are derived from the bracket size; the records only
    /// supply sides and state. `champion` is used for brackets without matches.
    pub fn restore(
        bracket_size: usize,
        entrant_count: usize,
        champion: Option<EntrantId>,
        records: &[BracketMatchRecord],
    ) -> TournamentResult<Self> {
        if bracket_size == 1 {
            if !records.is_empty() || champion.is_none() {
                return Err(TournamentError::Corrupt(
                    "single-entrant bracket must have a champion and no matches".to_string(),
                ));
            }
            return Ok(Self::from_parts(1, entrant_count, Vec::new(), Vec::new(), champion));
        }

        let (rounds, matches) = builder::skeleton(bracket_size)
            .map_err(|e| TournamentError::Corrupt(e.to_string()))?;
        let mut bracket = Self::from_parts(bracket_size, entrant_count, rounds, matches, None);

        if records.len() != bracket.matches.len() {
            return Err(TournamentError::Corrupt(format!(
                "bracket of size {} needs {} matches, found {}",
                bracket_size,
                bracket.matches.len(),
                records.len()
            )));
        }

        let mut filled = vec![false; bracket.matches.len()];
        for record in records {
            let idx = bracket
                .index_of(record.slot)
                .map_err(|_| TournamentError::Corrupt(format!("stray match {}", record.slot)))?;
            if filled[idx] {
                return Err(TournamentError::Corrupt(format!(
                    "match {} stored twice",
                    record.slot
                )));
            }
            filled[idx] = true;

            let m = &mut bracket.matches[idx];
            m.side_a = record.side_a;
            m.side_b = record.side_b;
            m.state = MatchState::from_record(record)?;
        }

        bracket.champion = bracket.final_winner();
        Ok(bracket)
    }

    pub fn bracket_size(&self) -> usize {
        self.bracket_size
    }

    pub fn entrant_count(&self) -> usize {
        self.entrant_count
    }

    pub fn rounds(&self) -> &[RoundName] {
        &self.rounds
    }

    pub fn matches(&self) -> &[BracketMatch] {
        &self.matches
    }

    pub fn champion(&self) -> Option<EntrantId> {
        self.champion
    }

    pub fn is_complete(&self) -> bool {
        self.champion.is_some()
    }

    pub fn records(&self) -> Vec<BracketMatchRecord> {
        self.matches.iter().map(BracketMatch::record).collect()
    }

    pub fn get(&self, slot: MatchSlot) -> TournamentResult<&BracketMatch> {
        let idx = self.index_of(slot)?;
        Ok(&self.matches[idx])
    }

    fn index_of(&self, slot: MatchSlot) -> TournamentResult<usize> {
        let mut offset = 0;
        for round in &self.rounds {
            let count = round.match_count();
            if *round == slot.round {
                if (slot.position as usize) < count {
                    return Ok(offset + slot.position as usize);
                }
                break;
            }
            offset += count;
        }
        Err(TournamentError::MatchNotFound(slot))
    }

    fn feeder(&self, idx: usize, side: Side) -> Option<&BracketMatch> {
        self.matches.iter().find(|m| m.next == Some((idx, side)))
    }

    fn final_winner(&self) -> Option<EntrantId> {
        self.matches
            .last()
            .and_then(BracketMatch::winner)
            .and_then(|w| w.entrant())
    }

    /// Resolve every bye match, cascading through later rounds
    pub(super) fn resolve_byes(&mut self) {
        for idx in 0..self.matches.len() {
            if self.matches[idx].settle_bye() {
                self.advance(idx);
            }
        }
    }

    /// Carry the winner of a finished match forward, settling bye matches on
    /// the way. Crowns the champion when the final is reached.
    fn advance(&mut self, mut idx: usize) {
        loop {
            let Some(winner) = self.matches[idx].winner() else {
                return;
            };

            let Some((next, side)) = self.matches[idx].next else {
                self.champion = winner.entrant();
                if let Some(champion) = self.champion {
                    log::info!("Entrant {} wins the bracket", champion);
                }
                return;
            };

            self.matches[next].set_side(side, winner);
            if !self.matches[next].settle_bye() {
                return;
            }
            idx = next;
        }
    }

    /// Fail unless the match fed by `idx` can still take a different winner
    fn ensure_downstream_open(&self, idx: usize) -> TournamentResult<()> {
        if let Some((next, _)) = self.matches[idx].next {
            match self.matches[next].status() {
                MatchStatus::Pending | MatchStatus::Canceled => {}
                MatchStatus::InProgress | MatchStatus::Finished => {
                    return Err(TournamentError::DownstreamStarted(self.matches[idx].slot));
                }
            }
        }
        Ok(())
    }

    /// Put a match on court
    ///
    /// # Errors
    ///
    /// * `InvalidTransition` - Match is not pending
    /// * `MissingCourt` - Blank court
    /// * `BlockedByCanceledMatch` - A feeder match was canceled
    /// * `SlotUnresolved` - A side is still waiting for its feeder
    pub fn start(&mut self, slot: MatchSlot, court: &str) -> TournamentResult<()> {
        let idx = self.index_of(slot)?;
        let m = &self.matches[idx];

        if m.status() != MatchStatus::Pending {
            return Err(m.invalid("start"));
        }

        let court = court.trim();
        if court.is_empty() {
            return Err(TournamentError::MissingCourt);
        }

        for side in [Side::A, Side::B] {
            if m.side(side).is_resolved() {
                continue;
            }
            return Err(match self.feeder(idx, side) {
                Some(f) if f.status() == MatchStatus::Canceled => {
                    TournamentError::BlockedByCanceledMatch {
                        slot,
                        blocker: f.slot,
                    }
                }
                _ => TournamentError::SlotUnresolved(slot),
            });
        }

        self.matches[idx].state = MatchState::InProgress {
            court: court.to_string(),
        };
        log::info!("Match {} started on court {}", slot, court);
        Ok(())
    }

    /// Record the score of a match in progress and advance the winner
    ///
    /// Equal scores are always rejected: elimination matches need a winner.
    pub fn record_result(
        &mut self,
        slot: MatchSlot,
        score_a: u32,
        score_b: u32,
    ) -> TournamentResult<Slot> {
        let result = decisive(score_a, score_b)?;
        let idx = self.index_of(slot)?;

        let m = &self.matches[idx];
        let MatchState::InProgress { court } = &m.state else {
            return Err(m.invalid("record a result for"));
        };
        let court = court.clone();
        let winner = winner_of(m, &result);

        self.matches[idx].state = MatchState::Finished {
            court: Some(court),
            result: Some(result),
            winner,
        };

        log::info!(
            "Match {} finished {}-{}, winner {:?}",
            slot,
            score_a,
            score_b,
            winner
        );
        self.advance(idx);
        Ok(winner)
    }

    /// Correct the score of a finished match
    ///
    /// Keeping the same winner only rewrites the score and re-places the
    /// winner in the next match. Changing the winner is refused once the next
    /// match has started.
    pub fn correct_result(
        &mut self,
        slot: MatchSlot,
        score_a: u32,
        score_b: u32,
    ) -> TournamentResult<Slot> {
        let result = decisive(score_a, score_b)?;
        let idx = self.index_of(slot)?;

        let m = &self.matches[idx];
        let (court, previous) = match &m.state {
            MatchState::Finished {
                result: None,
                ..
            } => return Err(TournamentError::ByeMatch(slot)),
            MatchState::Finished { court, winner, .. } => (court.clone(), *winner),
            _ => return Err(m.invalid("correct the result of")),
        };

        let winner = winner_of(m, &result);
        if winner != previous {
            self.ensure_downstream_open(idx)?;
        }

        self.matches[idx].state = MatchState::Finished {
            court,
            result: Some(result),
            winner,
        };

        if winner == previous {
            log::info!("Match {} score corrected to {}-{}", slot, score_a, score_b);
        } else {
            log::warn!(
                "Match {} corrected to {}-{}, winner changed from {:?} to {:?}",
                slot,
                score_a,
                score_b,
                previous,
                winner
            );
        }

        self.advance(idx);
        Ok(winner)
    }

    /// Cancel a pending or running match. Nothing is propagated.
    pub fn cancel(&mut self, slot: MatchSlot) -> TournamentResult<()> {
        let idx = self.index_of(slot)?;
        let m = &mut self.matches[idx];

        let court = match &m.state {
            MatchState::Pending => None,
            MatchState::InProgress { court } => Some(court.clone()),
            _ => return Err(m.invalid("cancel")),
        };

        m.state = MatchState::Canceled { court };
        log::info!("Match {} canceled", slot);
        Ok(())
    }

    /// Administrative reopen.
    ///
    /// `CANCELED` returns to `PENDING`. `FINISHED` returns to `IN_PROGRESS`,
    /// dropping the result and taking the winner back out of the next match.
    pub fn reactivate(&mut self, slot: MatchSlot) -> TournamentResult<MatchStatus> {
        let idx = self.index_of(slot)?;

        let m = &self.matches[idx];
        let status = match m.status() {
            MatchStatus::Canceled => {
                self.matches[idx].state = MatchState::Pending;
                // A bye may have arrived while the match was canceled
                if self.matches[idx].settle_bye() {
                    self.advance(idx);
                }
                self.matches[idx].status()
            }
            MatchStatus::Finished if m.is_bye_resolved() => {
                return Err(TournamentError::ByeMatch(slot));
            }
            MatchStatus::Finished => {
                let court = m.court().unwrap_or_default().to_string();
                self.ensure_downstream_open(idx)?;

                self.matches[idx].state = MatchState::InProgress { court };
                match self.matches[idx].next {
                    Some((next, side)) => self.matches[next].set_side(side, Slot::Open),
                    None => self.champion = None,
                }
                MatchStatus::InProgress
            }
            MatchStatus::Pending | MatchStatus::InProgress => {
                return Err(m.invalid("reactivate"));
            }
        };

        log::warn!("Match {} reactivated, now {}", slot, status);
        Ok(status)
    }

    /// Read model of the whole bracket
    pub fn view(&self, version: i64) -> BracketView {
        let mut rounds: Vec<RoundView> = self
            .rounds
            .iter()
            .map(|name| RoundView {
                name: *name,
                matches: Vec::with_capacity(name.match_count()),
            })
            .collect();

        let mut offset = 0;
        for view in rounds.iter_mut() {
            let count = view.name.match_count();
            for m in &self.matches[offset..offset + count] {
                view.matches.push(MatchView {
                    round: m.slot.round,
                    position: m.slot.position,
                    side_a: m.side_a,
                    side_b: m.side_b,
                    state: m.state.clone(),
                    next: m.next.map(|(n, side)| NextSlotView {
                        round: self.matches[n].slot.round,
                        position: self.matches[n].slot.position,
                        side,
                    }),
                });
            }
            offset += count;
        }

        BracketView {
            version,
            bracket_size: self.bracket_size,
            entrant_count: self.entrant_count,
            champion: self.champion,
            rounds,
        }
    }
}

fn decisive(score_a: u32, score_b: u32) -> TournamentResult<MatchResult> {
    check_scores(score_a, score_b)?;
    if score_a == score_b {
        return Err(TournamentError::DrawnScore { score_a, score_b });
    }
    Ok(MatchResult { score_a, score_b })
}

fn winner_of(m: &BracketMatch, result: &MatchResult) -> Slot {
    match result.winning_side() {
        Some(Side::B) => m.side_b,
        _ => m.side_a,
    }
}

/// Bracket as returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct BracketView {
    pub version: i64,
    pub bracket_size: usize,
    pub entrant_count: usize,
    pub champion: Option<EntrantId>,
    pub rounds: Vec<RoundView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundView {
    pub name: RoundName,
    pub matches: Vec<MatchView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchView {
    pub round: RoundName,
    pub position: u32,
    pub side_a: Slot,
    pub side_b: Slot,
    #[serde(flatten)]
    pub state: MatchState,
    pub next: Option<NextSlotView>,
}

/// Where a match's winner goes
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NextSlotView {
    pub round: RoundName,
    pub position: u32,
    pub side: Side,
}
