//! Integration tests for the full tournament lifecycle
//!
//! These tests drive a tournament from registration through the zone stage,
//! seeding and the bracket to a champion, against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use zonecup::bracket::{
    Bracket, BracketView, MatchSlot, MatchState, MatchView, RoundName, Seed, Slot,
};
use zonecup::db::{MemoryStore, StoredBracket, TournamentStore};
use zonecup::registration::{Couple, Entrant, EntrantId, Player, PlayerId};
use zonecup::tournament::{
    Category, NewTournament, StageAdvance, Tournament, TournamentConfig, TournamentFormat,
    TournamentId, TournamentManager, TournamentStatus,
};
use zonecup::zone::{Zone, ZoneDraft, ZoneId, ZoneMatch, ZoneMatchId};
use zonecup::{ErrorKind, TournamentError, TournamentResult};

async fn manager_with_roster(players: i64) -> TournamentManager {
    let manager = TournamentManager::new(Arc::new(MemoryStore::new()));
    for id in 1..=players {
        manager
            .upsert_player(Player {
                id,
                display_name: format!("Player {id}"),
                ranking: 100 - id,
            })
            .await
            .unwrap();
    }
    manager
}

/// Open a zone-then-bracket tournament and register couples (1,2), (3,4), ...
async fn tournament_with_couples(
    manager: &TournamentManager,
    couples: i64,
) -> (TournamentId, Vec<EntrantId>) {
    let tournament = manager
        .create_tournament(NewTournament {
            name: "Winter Open".to_string(),
            club_id: 12,
            format: TournamentFormat::ZoneThenBracket,
            category: Category::Mixed,
            config: TournamentConfig::default(),
        })
        .await
        .unwrap();
    manager.open_registration(tournament.id).await.unwrap();

    let mut entrants = Vec::new();
    for c in 0..couples {
        let entrant = manager
            .register_couple(tournament.id, 2 * c + 1, 2 * c + 2)
            .await
            .unwrap();
        entrants.push(entrant.id);
    }
    (tournament.id, entrants)
}

/// Score a zone match so that `winner` takes it 6-2
async fn win_zone_match(manager: &TournamentManager, m: &ZoneMatch, winner: EntrantId) {
    let (a, b) = if m.entrant_a == winner { (6, 2) } else { (2, 6) };
    manager.record_zone_match_result(m.id, a, b).await.unwrap();
}

/// Play the zone stage of a five-couple tournament so that the zone order is
/// A: e1, e4, e5 and B: e2, e3.
async fn play_zone_stage(manager: &TournamentManager, id: TournamentId, e: &[EntrantId]) {
    let zones = manager.start_zone_stage(id).await.unwrap().zones;
    assert_eq!(zones.len(), 2);
    assert_eq!(zones[0].entrant_ids, vec![e[0], e[3], e[4]]);
    assert_eq!(zones[1].entrant_ids, vec![e[1], e[2]]);

    let preference = [e[0], e[3], e[4], e[1], e[2]];
    let place = |x: EntrantId| preference.iter().position(|p| *p == x);
    let better = |a: EntrantId, b: EntrantId| if place(a) < place(b) { a } else { b };

    for zone in &zones {
        for m in manager.list_zone_matches(zone.id).await.unwrap() {
            win_zone_match(manager, &m, better(m.entrant_a, m.entrant_b)).await;
        }
    }
}

fn match_at(view: &BracketView, round: RoundName, position: usize) -> &MatchView {
    let round = view
        .rounds
        .iter()
        .find(|r| r.name == round)
        .expect("round exists");
    &round.matches[position]
}

fn winner(m: &MatchView) -> Option<Slot> {
    match &m.state {
        MatchState::Finished { winner, .. } => Some(*winner),
        _ => None,
    }
}

#[tokio::test]
async fn test_full_tournament_to_champion() {
    let manager = manager_with_roster(10).await;
    let (id, e) = tournament_with_couples(&manager, 5).await;

    play_zone_stage(&manager, id, &e).await;

    // The last zone result builds the bracket
    let tournament = manager.get_tournament(id).await.unwrap();
    assert_eq!(tournament.status, TournamentStatus::InProgress);

    let seeds = manager.get_seeds(id).await.unwrap();
    let order: Vec<EntrantId> = seeds.iter().map(|s| s.entrant_id).collect();
    assert_eq!(order, vec![e[0], e[1], e[3], e[2], e[4]]);
    let byes: Vec<bool> = seeds.iter().map(|s| s.has_bye).collect();
    assert_eq!(byes, vec![true, true, true, false, false]);

    let view = manager.get_bracket(id).await.unwrap();
    assert_eq!(view.bracket_size, 8);
    assert_eq!(view.entrant_count, 5);
    assert_eq!(
        view.rounds.iter().map(|r| r.name).collect::<Vec<_>>(),
        vec![RoundName::Quarterfinal, RoundName::Semifinal, RoundName::Final]
    );

    // Seeds 1-3 advance on byes; seed 4 meets seed 5
    assert_eq!(
        winner(match_at(&view, RoundName::Quarterfinal, 0)),
        Some(Slot::Entrant(e[0]))
    );
    let qf1 = match_at(&view, RoundName::Quarterfinal, 1);
    assert_eq!(qf1.side_a, Slot::Entrant(e[2]));
    assert_eq!(qf1.side_b, Slot::Entrant(e[4]));
    assert!(matches!(qf1.state, MatchState::Pending));

    let qf1 = MatchSlot::new(RoundName::Quarterfinal, 1);
    let sf0 = MatchSlot::new(RoundName::Semifinal, 0);
    let sf1 = MatchSlot::new(RoundName::Semifinal, 1);
    let fin = MatchSlot::new(RoundName::Final, 0);

    manager.start_bracket_match(id, qf1, "Court 1").await.unwrap();
    manager
        .record_bracket_match_result(id, qf1, 6, 3)
        .await
        .unwrap();

    manager.start_bracket_match(id, sf0, "Court 1").await.unwrap();
    manager.start_bracket_match(id, sf1, "Court 2").await.unwrap();
    manager
        .record_bracket_match_result(id, sf0, 6, 1)
        .await
        .unwrap();
    let view = manager
        .record_bracket_match_result(id, sf1, 4, 6)
        .await
        .unwrap();

    let final_match = match_at(&view, RoundName::Final, 0);
    assert_eq!(final_match.side_a, Slot::Entrant(e[0]));
    assert_eq!(final_match.side_b, Slot::Entrant(e[3]));

    manager.start_bracket_match(id, fin, "Center").await.unwrap();
    let view = manager
        .record_bracket_match_result(id, fin, 7, 5)
        .await
        .unwrap();

    assert_eq!(view.champion, Some(e[0]));
    let tournament = manager.get_tournament(id).await.unwrap();
    assert_eq!(tournament.status, TournamentStatus::Finished);

    // A finished tournament accepts no more bracket changes
    let result = manager.reactivate_match(id, fin).await;
    assert!(matches!(result, Err(TournamentError::InvalidState { .. })));
}

#[tokio::test]
async fn test_zone_results_freeze_once_bracket_exists() {
    let manager = manager_with_roster(10).await;
    let (id, e) = tournament_with_couples(&manager, 5).await;
    play_zone_stage(&manager, id, &e).await;

    let zones = manager.list_zones(id).await.unwrap();
    let m = manager.list_zone_matches(zones[0].id).await.unwrap()[0].clone();

    let result = manager.record_zone_match_result(m.id, 0, 6).await;
    assert!(matches!(result, Err(TournamentError::ZoneResultsLocked(_))));

    let again = manager.build_bracket(id).await;
    assert!(matches!(again, Err(TournamentError::BracketAlreadyBuilt(_))));
}

#[tokio::test]
async fn test_zone_corrections_before_bracket() {
    let manager = manager_with_roster(6).await;
    let (id, e) = tournament_with_couples(&manager, 3).await;

    let zones = manager.start_zone_stage(id).await.unwrap().zones;
    assert_eq!(zones.len(), 1);
    let matches = manager.list_zone_matches(zones[0].id).await.unwrap();
    assert_eq!(matches.len(), 3);

    // Bracket cannot be built while matches are pending
    let early = manager.build_bracket(id).await;
    assert!(matches!(
        early,
        Err(TournamentError::ZoneStageIncomplete { pending: 3 })
    ));

    let first = manager
        .record_zone_match_result(matches[0].id, 6, 0)
        .await
        .unwrap()
        .zone_match;
    assert_eq!(first.version, 2);

    let corrected = manager
        .record_zone_match_result(matches[0].id, 0, 6)
        .await
        .unwrap()
        .zone_match;
    assert_eq!(corrected.score, Some((0, 6)));
    assert_eq!(corrected.version, 3);

    let standings = manager.get_standings(zones[0].id).await.unwrap();
    assert_eq!(standings.len(), 3);
    assert_eq!(standings[0].entrant_id, matches[0].entrant_b);
    assert!(standings.iter().all(|s| e.contains(&s.entrant_id)));
}

#[tokio::test]
async fn test_stale_zone_match_version_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let manager = TournamentManager::new(store.clone());
    for id in 1..=4 {
        manager
            .upsert_player(Player {
                id,
                display_name: format!("P{id}"),
                ranking: 0,
            })
            .await
            .unwrap();
    }
    let (id, _) = tournament_with_couples(&manager, 2).await;
    let zones = manager.start_zone_stage(id).await.unwrap().zones;

    // Two writers holding the same version of the match
    let mut stale = manager.list_zone_matches(zones[0].id).await.unwrap()[0].clone();
    let mut fresh = stale.clone();

    fresh.record(6, 4).unwrap();
    store.save_zone_match(&fresh).await.unwrap();

    stale.record(4, 6).unwrap();
    let result = store.save_zone_match(&stale).await;
    assert!(matches!(
        result,
        Err(TournamentError::ConcurrentModification(_))
    ));
}

#[tokio::test]
async fn test_canceled_match_blocks_next_round_until_reactivated() {
    let manager = manager_with_roster(10).await;
    let (id, e) = tournament_with_couples(&manager, 5).await;
    play_zone_stage(&manager, id, &e).await;

    let qf1 = MatchSlot::new(RoundName::Quarterfinal, 1);
    let sf0 = MatchSlot::new(RoundName::Semifinal, 0);

    manager.cancel_match(id, qf1).await.unwrap();

    let blocked = manager.start_bracket_match(id, sf0, "Court 3").await;
    assert!(matches!(
        blocked,
        Err(TournamentError::BlockedByCanceledMatch { .. })
    ));
    assert_eq!(blocked.unwrap_err().kind(), ErrorKind::Precondition);

    manager.reactivate_match(id, qf1).await.unwrap();
    manager.start_bracket_match(id, qf1, "Court 3").await.unwrap();
    manager
        .record_bracket_match_result(id, qf1, 3, 6)
        .await
        .unwrap();

    let view = manager.start_bracket_match(id, sf0, "Court 3").await.unwrap();
    let sf = match_at(&view, RoundName::Semifinal, 0);
    assert_eq!(sf.side_b, Slot::Entrant(e[4]));
    assert!(matches!(sf.state, MatchState::InProgress { .. }));
}

#[tokio::test]
async fn test_correction_reaches_next_round_once() {
    let manager = manager_with_roster(10).await;
    let (id, e) = tournament_with_couples(&manager, 5).await;
    play_zone_stage(&manager, id, &e).await;

    let qf1 = MatchSlot::new(RoundName::Quarterfinal, 1);
    manager.start_bracket_match(id, qf1, "Court 1").await.unwrap();
    manager
        .record_bracket_match_result(id, qf1, 6, 4)
        .await
        .unwrap();

    // Same winner: score updated, next slot unchanged
    let view = manager
        .correct_bracket_match_result(id, qf1, 7, 5)
        .await
        .unwrap();
    let sf = match_at(&view, RoundName::Semifinal, 0);
    assert_eq!(sf.side_a, Slot::Entrant(e[0]));
    assert_eq!(sf.side_b, Slot::Entrant(e[2]));

    // Different winner while the semifinal is pending
    let view = manager
        .correct_bracket_match_result(id, qf1, 5, 7)
        .await
        .unwrap();
    let sf = match_at(&view, RoundName::Semifinal, 0);
    assert_eq!(sf.side_b, Slot::Entrant(e[4]));

    // Equal scores are never accepted
    let drawn = manager.correct_bracket_match_result(id, qf1, 6, 6).await;
    assert!(matches!(drawn, Err(TournamentError::DrawnScore { .. })));
}

#[tokio::test]
async fn test_concurrent_bracket_results_only_one_wins() {
    let manager = manager_with_roster(10).await;
    let (id, e) = tournament_with_couples(&manager, 5).await;
    play_zone_stage(&manager, id, &e).await;

    let qf1 = MatchSlot::new(RoundName::Quarterfinal, 1);
    manager.start_bracket_match(id, qf1, "Court 1").await.unwrap();

    let handles: Vec<_> = [(6, 2), (2, 6)]
        .into_iter()
        .map(|(a, b)| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.record_bracket_match_result(id, qf1, a, b).await })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict, "unexpected error {e}"),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn test_cancel_tournament_mid_bracket() {
    let manager = manager_with_roster(10).await;
    let (id, e) = tournament_with_couples(&manager, 5).await;
    play_zone_stage(&manager, id, &e).await;

    manager.cancel_tournament(id).await.unwrap();

    let qf1 = MatchSlot::new(RoundName::Quarterfinal, 1);
    let result = manager.start_bracket_match(id, qf1, "Court 1").await;
    assert!(matches!(
        result,
        Err(TournamentError::InvalidState {
            actual: TournamentStatus::Canceled,
            ..
        })
    ));
}

/// Memory store that lets one zone correction commit right before the next
/// bracket insert, as a concurrent writer would.
struct CorrectionBeforeBracket {
    inner: MemoryStore,
    armed: AtomicBool,
}

#[async_trait]
impl TournamentStore for CorrectionBeforeBracket {
    async fn create_tournament(&self, new: &NewTournament) -> TournamentResult<Tournament> {
        self.inner.create_tournament(new).await
    }

    async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Option<Tournament>> {
        self.inner.get_tournament(id).await
    }

    async fn transition_tournament(
        &self,
        id: TournamentId,
        from: &[TournamentStatus],
        to: TournamentStatus,
        action: &'static str,
    ) -> TournamentResult<Tournament> {
        self.inner.transition_tournament(id, from, to, action).await
    }

    async fn cancel_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.inner.cancel_tournament(id).await
    }

    async fn upsert_player(&self, player: &Player) -> TournamentResult<Player> {
        self.inner.upsert_player(player).await
    }

    async fn get_player(&self, id: PlayerId) -> TournamentResult<Option<Player>> {
        self.inner.get_player(id).await
    }

    async fn find_or_create_couple(&self, a: PlayerId, b: PlayerId) -> TournamentResult<Couple> {
        self.inner.find_or_create_couple(a, b).await
    }

    async fn insert_entrant(
        &self,
        tournament_id: TournamentId,
        couple: &Couple,
    ) -> TournamentResult<Entrant> {
        self.inner.insert_entrant(tournament_id, couple).await
    }

    async fn withdraw_entrant(
        &self,
        tournament_id: TournamentId,
        entrant_id: EntrantId,
    ) -> TournamentResult<Entrant> {
        self.inner.withdraw_entrant(tournament_id, entrant_id).await
    }

    async fn list_entrants(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Entrant>> {
        self.inner.list_entrants(tournament_id).await
    }

    async fn start_zone_stage(
        &self,
        tournament_id: TournamentId,
        drafts: &[ZoneDraft],
        status_after: TournamentStatus,
    ) -> TournamentResult<Vec<Zone>> {
        self.inner
            .start_zone_stage(tournament_id, drafts, status_after)
            .await
    }

    async fn list_zones(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Zone>> {
        self.inner.list_zones(tournament_id).await
    }

    async fn get_zone(&self, zone_id: ZoneId) -> TournamentResult<Option<Zone>> {
        self.inner.get_zone(zone_id).await
    }

    async fn list_zone_matches(&self, zone_id: ZoneId) -> TournamentResult<Vec<ZoneMatch>> {
        self.inner.list_zone_matches(zone_id).await
    }

    async fn list_tournament_zone_matches(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<ZoneMatch>> {
        self.inner.list_tournament_zone_matches(tournament_id).await
    }

    async fn get_zone_match(&self, id: ZoneMatchId) -> TournamentResult<Option<ZoneMatch>> {
        self.inner.get_zone_match(id).await
    }

    async fn save_zone_match(&self, m: &ZoneMatch) -> TournamentResult<ZoneMatch> {
        self.inner.save_zone_match(m).await
    }

    async fn insert_bracket(
        &self,
        tournament_id: TournamentId,
        zone_versions: &[(ZoneMatchId, i64)],
        seeds: &[Seed],
        bracket: &Bracket,
        status_after: TournamentStatus,
    ) -> TournamentResult<i64> {
        if self.armed.swap(false, Ordering::SeqCst) {
            // Hand every zone match to entrant B
            for mut m in self.inner.list_tournament_zone_matches(tournament_id).await? {
                m.record(1, 6)?;
                self.inner.save_zone_match(&m).await?;
            }
        }
        self.inner
            .insert_bracket(tournament_id, zone_versions, seeds, bracket, status_after)
            .await
    }

    async fn load_bracket(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<StoredBracket>> {
        self.inner.load_bracket(tournament_id).await
    }

    async fn save_bracket(
        &self,
        tournament_id: TournamentId,
        bracket: &Bracket,
        expected_version: i64,
        status_after: Option<TournamentStatus>,
    ) -> TournamentResult<i64> {
        self.inner
            .save_bracket(tournament_id, bracket, expected_version, status_after)
            .await
    }

    async fn list_seeds(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Seed>> {
        self.inner.list_seeds(tournament_id).await
    }
}

#[tokio::test]
async fn test_bracket_is_not_seeded_from_stale_zone_results() {
    let store = Arc::new(CorrectionBeforeBracket {
        inner: MemoryStore::new(),
        armed: AtomicBool::new(false),
    });
    let manager = TournamentManager::new(store.clone());
    for id in 1..=4 {
        manager
            .upsert_player(Player {
                id,
                display_name: format!("P{id}"),
                ranking: 0,
            })
            .await
            .unwrap();
    }
    let (id, _) = tournament_with_couples(&manager, 2).await;
    let zones = manager.start_zone_stage(id).await.unwrap().zones;
    let m = manager.list_zone_matches(zones[0].id).await.unwrap()[0].clone();

    // Entrant A wins, but a correction lands before the bracket is stored
    store.armed.store(true, Ordering::SeqCst);
    let recorded = manager.record_zone_match_result(m.id, 6, 1).await.unwrap();
    assert!(recorded.advance.is_none());

    // The stale bracket was refused, so zone results stay open
    assert_eq!(
        manager.get_tournament(id).await.unwrap().status,
        TournamentStatus::Pairing
    );
    assert!(manager.get_seeds(id).await.unwrap().is_empty());
    assert!(matches!(
        manager.get_bracket(id).await,
        Err(TournamentError::BracketNotFound(_))
    ));

    // Rebuilding seeds from the stored history
    manager.build_bracket(id).await.unwrap();
    let standings = manager.get_standings(zones[0].id).await.unwrap();
    let seeds = manager.get_seeds(id).await.unwrap();
    assert_eq!(standings[0].entrant_id, m.entrant_b);
    assert_eq!(seeds[0].entrant_id, standings[0].entrant_id);
}

#[tokio::test]
async fn test_last_zone_result_reports_the_built_bracket() {
    let manager = manager_with_roster(4).await;
    let (id, e) = tournament_with_couples(&manager, 2).await;
    let zones = manager.start_zone_stage(id).await.unwrap().zones;
    let m = manager.list_zone_matches(zones[0].id).await.unwrap()[0].clone();

    let recorded = manager.record_zone_match_result(m.id, 6, 2).await.unwrap();
    match recorded.advance {
        Some(StageAdvance::BracketBuilt(view)) => {
            assert_eq!(view.bracket_size, 2);
            assert_eq!(view.champion, None);
        }
        other => panic!("expected a built bracket, got {other:?}"),
    }
    assert!(e.contains(&recorded.zone_match.entrant_a));
}

#[tokio::test]
async fn test_oversized_zone_score_is_rejected() {
    let manager = manager_with_roster(4).await;
    let (id, _) = tournament_with_couples(&manager, 2).await;
    let zones = manager.start_zone_stage(id).await.unwrap().zones;
    let m = manager.list_zone_matches(zones[0].id).await.unwrap()[0].clone();

    let result = manager.record_zone_match_result(m.id, u32::MAX, 0).await;
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stored = manager.list_zone_matches(zones[0].id).await.unwrap();
    assert_eq!(stored[0].score, None);
}
