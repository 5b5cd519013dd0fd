use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::deck::build_deck;
use super::engine::{FlipOutcome, MatchEngine};
use super::profile::ProfileStore;
use super::records::{HighScoreRecord, HighScoreStore};
use super::scheduler::{GlibScheduler, Scheduler};
use super::state::{Card, Difficulty, GameStatus, MatchPhase};
use super::storage::{FileStore, KeyValueStore};
use super::timer::GameTimer;
use crate::config::GameConfig;

#[derive(Clone, Debug, PartialEq)]
pub struct GameResult {
    pub difficulty: Difficulty,
    pub score: u32,
    pub max_pairs: u32,
    pub turns: u32,
    pub time_secs: u32,
    pub new_high_score: bool,
    /// The result was written to the high-score table.
    pub saved: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    Started { difficulty: Difficulty },
    /// Some card changed its flipped or matched flag.
    BoardChanged,
    TurnResolved { matched: bool, score: u32, turns: u32 },
    Tick { elapsed_secs: u32 },
    Completed(GameResult),
    Ended,
}

type Listener = Rc<dyn Fn(&GameEvent)>;

struct SessionState {
    difficulty: Difficulty,
    status: GameStatus,
    score: u32,
    turns: u32,
    engine: MatchEngine,
    timer: GameTimer,
    game_id: u64,
    last_result: Option<GameResult>,
}

struct Shared {
    state: RefCell<SessionState>,
    listeners: RefCell<Vec<Listener>>,
    scheduler: Rc<dyn Scheduler>,
    store: Rc<dyn KeyValueStore>,
    high_scores: HighScoreStore,
    config: GameConfig,
}

impl Shared {
    fn emit(&self, event: &GameEvent) {
        // Listeners may call back into the session, so none of its cells stay borrowed.
        let listeners: Vec<Listener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(event);
        }
    }

    fn resolve_mismatch(&self, game_id: u64) {
        let reset = {
            let mut st = self.state.borrow_mut();
            st.game_id == game_id && st.engine.resolve_mismatch()
        };
        if reset {
            self.emit(&GameEvent::BoardChanged);
        }
    }

    fn complete_game(&self, game_id: u64) {
        let result = {
            let mut st = self.state.borrow_mut();
            if st.game_id != game_id || st.status != GameStatus::Active {
                return;
            }
            st.status = GameStatus::Completed;
            st.timer.stop();

            let mut result = GameResult {
                difficulty: st.difficulty,
                score: st.score,
                max_pairs: st.difficulty.pair_count() as u32,
                turns: st.turns,
                time_secs: st.timer.elapsed_secs(),
                new_high_score: false,
                saved: false,
            };
            if result.score == result.max_pairs {
                let record = HighScoreRecord::new(result.turns, result.time_secs, result.score);
                match self.high_scores.try_save_score(st.difficulty, record) {
                    Ok(is_best) => {
                        result.saved = true;
                        result.new_high_score = is_best;
                    }
                    Err(err) => {
                        warn!(difficulty = st.difficulty.code(), error = %err, "High score not saved");
                    }
                }
            }
            st.last_result = Some(result.clone());
            result
        };

        info!(
            difficulty = result.difficulty.code(),
            turns = result.turns,
            time_secs = result.time_secs,
            new_high_score = result.new_high_score,
            "Game completed"
        );
        self.emit(&GameEvent::Completed(result));
    }
}

/// Owns one player's run: difficulty, deck, counters, timer and the
/// high-score table. All callbacks run on the thread that created it.
pub struct GameSession {
    shared: Rc<Shared>,
}

impl GameSession {
    pub fn new(scheduler: Rc<dyn Scheduler>, store: Rc<dyn KeyValueStore>, config: GameConfig) -> Self {
        let timer = GameTimer::new(Rc::clone(&scheduler), config.tick_interval());
        let high_scores = HighScoreStore::with_limit(Rc::clone(&store), config.high_score_limit);
        let state = SessionState {
            difficulty: Difficulty::default(),
            status: GameStatus::NotStarted,
            score: 0,
            turns: 0,
            engine: MatchEngine::default(),
            timer,
            game_id: 0,
            last_result: None,
        };
        GameSession {
            shared: Rc::new(Shared {
                state: RefCell::new(state),
                listeners: RefCell::new(Vec::new()),
                scheduler,
                store,
                high_scores,
                config,
            }),
        }
    }

    /// Session on the glib main loop with scores kept under the configured
    /// storage directory.
    pub fn open(config: GameConfig) -> Self {
        let store = Rc::new(FileStore::new(config.resolved_storage_dir()));
        Self::new(Rc::new(GlibScheduler::new()), store, config)
    }

    pub fn subscribe(&self, listener: impl Fn(&GameEvent) + 'static) {
        self.shared.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn config(&self) -> &GameConfig {
        &self.shared.config
    }

    pub fn difficulty(&self) -> Difficulty {
        self.shared.state.borrow().difficulty
    }

    pub fn status(&self) -> GameStatus {
        self.shared.state.borrow().status
    }

    pub fn score(&self) -> u32 {
        self.shared.state.borrow().score
    }

    pub fn turns(&self) -> u32 {
        self.shared.state.borrow().turns
    }

    pub fn total_pairs(&self) -> u32 {
        self.difficulty().pair_count() as u32
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.shared.state.borrow().timer.elapsed_secs()
    }

    pub fn cards(&self) -> Vec<Card> {
        self.shared.state.borrow().engine.cards().to_vec()
    }

    pub fn phase(&self) -> MatchPhase {
        self.shared.state.borrow().engine.phase()
    }

    pub fn is_input_locked(&self) -> bool {
        self.shared.state.borrow().engine.is_locked()
    }

    pub fn last_result(&self) -> Option<GameResult> {
        self.shared.state.borrow().last_result.clone()
    }

    pub fn high_scores(&self) -> Vec<HighScoreRecord> {
        self.high_scores_for(self.difficulty())
    }

    pub fn high_scores_for(&self, difficulty: Difficulty) -> Vec<HighScoreRecord> {
        self.shared.high_scores.get_scores(difficulty)
    }

    pub fn clear_high_scores(&self) {
        self.shared.high_scores.clear_scores();
        info!("High scores cleared");
    }

    pub fn profiles(&self) -> ProfileStore {
        ProfileStore::new(Rc::clone(&self.shared.store))
    }

    /// Only applies between games; returns whether the tier is now `difficulty`.
    pub fn set_difficulty(&self, difficulty: Difficulty) -> bool {
        let mut st = self.shared.state.borrow_mut();
        if st.status != GameStatus::NotStarted {
            debug!(
                requested = difficulty.code(),
                "Difficulty change ignored during a game"
            );
            return st.difficulty == difficulty;
        }
        st.difficulty = difficulty;
        true
    }

    /// Deals a fresh deck and restarts the counters. Also serves as
    /// "play again" after a completed game.
    pub fn start_game(&self) {
        let difficulty = {
            let mut st = self.shared.state.borrow_mut();
            st.game_id = st.game_id.wrapping_add(1);
            st.score = 0;
            st.turns = 0;
            st.last_result = None;
            st.engine = MatchEngine::new(build_deck(st.difficulty));
            st.status = GameStatus::Active;

            let weak = Rc::downgrade(&self.shared);
            st.timer.start(true, move |elapsed_secs| {
                if let Some(shared) = weak.upgrade() {
                    shared.emit(&GameEvent::Tick { elapsed_secs });
                }
            });
            st.difficulty
        };

        info!(difficulty = difficulty.code(), "Game started");
        self.shared.emit(&GameEvent::Started { difficulty });
        self.shared.emit(&GameEvent::BoardChanged);
    }

    /// Abandons the current game without recording it.
    pub fn end_game(&self) {
        {
            let mut st = self.shared.state.borrow_mut();
            if st.status == GameStatus::NotStarted {
                return;
            }
            st.game_id = st.game_id.wrapping_add(1);
            st.status = GameStatus::NotStarted;
            st.score = 0;
            st.turns = 0;
            st.last_result = None;
            st.engine = MatchEngine::default();
            st.timer.reset();
        }

        info!("Game ended");
        self.shared.emit(&GameEvent::Ended);
    }

    pub fn select_card(&self, card_id: u32) {
        let mut events = Vec::with_capacity(2);
        {
            let mut st = self.shared.state.borrow_mut();
            if st.status != GameStatus::Active {
                return;
            }

            let outcome = st.engine.select(card_id);
            if outcome == FlipOutcome::Ignored {
                return;
            }
            events.push(GameEvent::BoardChanged);

            if outcome.completes_turn() {
                let matched = matches!(outcome, FlipOutcome::Match { .. });
                st.turns = st.turns.saturating_add(1);
                if matched {
                    st.score = st.score.saturating_add(1);
                }
                debug!(card_id, matched, score = st.score, turns = st.turns, "Turn resolved");
                events.push(GameEvent::TurnResolved {
                    matched,
                    score: st.score,
                    turns: st.turns,
                });
            }

            let game_id = st.game_id;
            if outcome == FlipOutcome::Mismatch {
                let weak = Rc::downgrade(&self.shared);
                self.shared.scheduler.once(
                    self.shared.config.mismatch_delay(),
                    Box::new(move || {
                        if let Some(shared) = weak.upgrade() {
                            shared.resolve_mismatch(game_id);
                        }
                    }),
                );
            } else if st.engine.take_completion() {
                // The clock stops on the final match, not when completion is announced.
                st.timer.stop();
                let weak = Rc::downgrade(&self.shared);
                self.shared.scheduler.once(
                    self.shared.config.completion_delay(),
                    Box::new(move || {
                        if let Some(shared) = weak.upgrade() {
                            shared.complete_game(game_id);
                        }
                    }),
                );
            }
        }

        for event in &events {
            self.shared.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::game::scheduler::ManualScheduler;
    use crate::game::storage::MemoryStore;

    fn session() -> (Rc<ManualScheduler>, GameSession) {
        let scheduler = Rc::new(ManualScheduler::new());
        let session = GameSession::new(
            scheduler.clone(),
            Rc::new(MemoryStore::new()),
            GameConfig::default(),
        );
        (scheduler, session)
    }

    fn pair_ids(session: &GameSession) -> Vec<(u32, u32)> {
        let cards = session.cards();
        let mut pairs = Vec::new();
        for (idx, card) in cards.iter().enumerate() {
            if let Some(other) = cards[idx + 1..].iter().find(|c| c.kind == card.kind) {
                pairs.push((card.id, other.id));
            }
        }
        pairs
    }

    fn mismatched_ids(session: &GameSession) -> (u32, u32) {
        let cards = session.cards();
        let first = &cards[0];
        let other = cards.iter().find(|c| c.kind != first.kind).unwrap();
        (first.id, other.id)
    }

    #[test]
    fn selections_before_start_are_ignored() {
        let (_, session) = session();
        session.select_card(0);
        assert_eq!(session.status(), GameStatus::NotStarted);
        assert!(session.cards().is_empty());
    }

    #[test]
    fn start_deals_a_deck_for_the_difficulty() {
        let (_, session) = session();
        assert!(session.set_difficulty(Difficulty::Hard));
        session.start_game();
        assert_eq!(session.status(), GameStatus::Active);
        assert_eq!(session.cards().len(), 20);
        assert_eq!(session.total_pairs(), 10);
    }

    #[test]
    fn difficulty_is_locked_while_playing() {
        let (_, session) = session();
        session.start_game();
        assert!(!session.set_difficulty(Difficulty::Medium));
        assert_eq!(session.difficulty(), Difficulty::Easy);
        session.end_game();
        assert!(session.set_difficulty(Difficulty::Medium));
    }

    #[test]
    fn mismatch_flips_back_after_the_delay() {
        let (scheduler, session) = session();
        session.start_game();
        let (a, b) = mismatched_ids(&session);
        session.select_card(a);
        session.select_card(b);
        assert_eq!(session.turns(), 1);
        assert_eq!(session.score(), 0);
        assert!(session.is_input_locked());

        scheduler.advance(Duration::from_millis(999));
        assert_eq!(session.phase(), MatchPhase::Resolving);
        scheduler.advance(Duration::from_millis(1));
        assert_eq!(session.phase(), MatchPhase::Idle);
        assert!(session.cards().iter().all(|card| !card.flipped));
    }

    #[test]
    fn stale_mismatch_reset_does_not_touch_a_new_game() {
        let (scheduler, session) = session();
        session.start_game();
        let (a, b) = mismatched_ids(&session);
        session.select_card(a);
        session.select_card(b);

        session.start_game();
        let first = session.cards()[0].id;
        session.select_card(first);
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(session.phase(), MatchPhase::OneSelected);
        assert!(session.cards()[0].flipped);
    }

    #[test]
    fn end_game_stops_the_clock_and_resets() {
        let (scheduler, session) = session();
        session.start_game();
        scheduler.advance(Duration::from_secs(3));
        assert_eq!(session.elapsed_secs(), 3);
        session.end_game();
        scheduler.advance(Duration::from_secs(3));
        assert_eq!(session.status(), GameStatus::NotStarted);
        assert_eq!(session.elapsed_secs(), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn completed_game_is_recorded() {
        let (scheduler, session) = session();
        session.start_game();
        scheduler.advance(Duration::from_secs(4));
        for (a, b) in pair_ids(&session) {
            session.select_card(a);
            session.select_card(b);
        }
        assert_eq!(session.score(), 6);
        assert_eq!(session.status(), GameStatus::Active);

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(session.status(), GameStatus::Completed);
        let result = session.last_result().unwrap();
        assert_eq!(result.turns, 6);
        assert_eq!(result.time_secs, 4);
        assert!(result.saved && result.new_high_score);
        assert_eq!(session.high_scores()[0].score_value, 8.0);
    }

    #[test]
    fn dropping_the_session_cancels_its_tick() {
        let (scheduler, session) = session();
        session.start_game();
        drop(session);
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn tick_listener_can_end_and_restart_on_the_main_loop() {
        use std::cell::Cell;

        use crate::game::scheduler::{spin_until, with_main_context};

        with_main_context(|ctx| {
            let scheduler = Rc::new(GlibScheduler::new());
            let config = GameConfig {
                tick_interval_ms: 5,
                ..GameConfig::default()
            };
            let session = Rc::new(GameSession::new(
                scheduler.clone(),
                Rc::new(MemoryStore::new()),
                config,
            ));

            let ticks = Rc::new(Cell::new(0u32));
            let weak = Rc::downgrade(&session);
            let seen = Rc::clone(&ticks);
            session.subscribe(move |event| {
                if let GameEvent::Tick { .. } = event {
                    seen.set(seen.get() + 1);
                    if seen.get() == 1
                        && let Some(session) = weak.upgrade()
                    {
                        session.end_game();
                    }
                }
            });

            session.start_game();
            let limit = Duration::from_secs(2);
            assert!(spin_until(ctx, limit, || ticks.get() == 1));
            assert_eq!(session.status(), GameStatus::NotStarted);
            assert_eq!(scheduler.pending(), 0);

            session.start_game();
            assert!(spin_until(ctx, limit, || ticks.get() >= 2));
            assert_eq!(session.status(), GameStatus::Active);
            assert!(session.elapsed_secs() >= 1);

            drop(session);
            assert_eq!(scheduler.pending(), 0);
        });
    }
}
