use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::state::Difficulty;
use super::storage::{HIGH_SCORES_KEY, KeyValueStore};
use crate::error::Result;

pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Ranking metric; lower is better. A turn weighs as much as two seconds.
pub fn score_value(turns: u32, time_secs: u32) -> f64 {
    turns as f64 + time_secs as f64 * 0.5
}

pub(crate) fn now_date_label() -> String {
    if let Ok(dt) = glib::DateTime::now_utc()
        && let Ok(text) = dt.format("%Y-%m-%dT%H:%M:%SZ")
    {
        return text.to_string();
    }
    "1970-01-01T00:00:00Z".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighScoreRecord {
    /// Nil for records written before ids existed.
    #[serde(default)]
    pub id: Uuid,
    pub turns: u32,
    pub time: u32,
    pub score: u32,
    pub score_value: f64,
    pub date: String,
}

impl HighScoreRecord {
    pub fn new(turns: u32, time: u32, score: u32) -> Self {
        HighScoreRecord {
            id: Uuid::new_v4(),
            turns,
            time,
            score,
            score_value: score_value(turns, time),
            date: now_date_label(),
        }
    }

    pub fn is_complete_for(&self, difficulty: Difficulty) -> bool {
        self.score as usize == difficulty.pair_count()
    }
}

fn sort_records(entries: &mut [HighScoreRecord]) {
    entries.sort_by(|a, b| a.score_value.total_cmp(&b.score_value));
}

/// Ranked results per difficulty, persisted as one JSON object keyed by
/// difficulty code.
pub struct HighScoreStore {
    store: Rc<dyn KeyValueStore>,
    limit: usize,
}

impl HighScoreStore {
    pub fn new(store: Rc<dyn KeyValueStore>) -> Self {
        Self::with_limit(store, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(store: Rc<dyn KeyValueStore>, limit: usize) -> Self {
        HighScoreStore {
            store,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn load_table(&self) -> Result<Map<String, Value>> {
        let Some(raw) = self.store.get(HIGH_SCORES_KEY)? else {
            return Ok(Map::new());
        };
        match serde_json::from_str::<Map<String, Value>>(&raw) {
            Ok(table) => Ok(table),
            Err(err) => {
                warn!(error = %err, "Discarding unreadable high score table");
                Ok(Map::new())
            }
        }
    }

    fn records_in(table: &Map<String, Value>, difficulty: Difficulty) -> Vec<HighScoreRecord> {
        let Some(value) = table.get(difficulty.code()) else {
            return Vec::new();
        };
        match serde_json::from_value::<Vec<HighScoreRecord>>(value.clone()) {
            Ok(mut records) => {
                sort_records(&mut records);
                records
            }
            Err(err) => {
                warn!(
                    difficulty = difficulty.code(),
                    error = %err,
                    "Discarding unreadable high scores"
                );
                Vec::new()
            }
        }
    }

    /// # Errors
    /// Returns an error only when the backend itself fails; unreadable
    /// data reads as an empty list.
    pub fn try_get_scores(&self, difficulty: Difficulty) -> Result<Vec<HighScoreRecord>> {
        let table = self.load_table()?;
        Ok(Self::records_in(&table, difficulty))
    }

    pub fn get_scores(&self, difficulty: Difficulty) -> Vec<HighScoreRecord> {
        self.try_get_scores(difficulty).unwrap_or_else(|err| {
            warn!(difficulty = difficulty.code(), error = %err, "Failed to read high scores");
            Vec::new()
        })
    }

    /// Inserts `record`, keeps the best `limit` entries and reports whether
    /// `record` is now ranked first. Incomplete games are not recorded.
    ///
    /// # Errors
    /// Returns an error if the table cannot be read from or written to the backend.
    pub fn try_save_score(&self, difficulty: Difficulty, record: HighScoreRecord) -> Result<bool> {
        if !record.is_complete_for(difficulty) {
            debug!(
                difficulty = difficulty.code(),
                score = record.score,
                "Ignoring result of an incomplete game"
            );
            return Ok(false);
        }

        let mut table = self.load_table()?;
        let record_id = record.id;
        let mut records = Self::records_in(&table, difficulty);
        records.push(record);
        sort_records(&mut records);
        records.truncate(self.limit);

        let is_best = records.first().is_some_and(|best| best.id == record_id);
        table.insert(difficulty.code().to_string(), serde_json::to_value(&records)?);
        self.store
            .set(HIGH_SCORES_KEY, &serde_json::to_string(&table)?)?;

        debug!(
            difficulty = difficulty.code(),
            kept = records.len(),
            is_best,
            "Saved high score"
        );
        Ok(is_best)
    }

    /// False when the record is not the new best or could not be stored.
    pub fn save_score(&self, difficulty: Difficulty, record: HighScoreRecord) -> bool {
        self.try_save_score(difficulty, record).unwrap_or_else(|err| {
            warn!(difficulty = difficulty.code(), error = %err, "High score not saved");
            false
        })
    }

    /// # Errors
    /// Returns an error if the backend fails to delete the table.
    pub fn try_clear_scores(&self) -> Result<()> {
        self.store.remove(HIGH_SCORES_KEY)
    }

    pub fn clear_scores(&self) {
        if let Err(err) = self.try_clear_scores() {
            warn!(error = %err, "Failed to clear high scores");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameError;
    use crate::game::storage::MemoryStore;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(GameError::Storage("disabled".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(GameError::Storage("quota exceeded".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(GameError::Storage("disabled".to_string()))
        }
    }

    fn store() -> (Rc<MemoryStore>, HighScoreStore) {
        let backend = Rc::new(MemoryStore::new());
        let scores = HighScoreStore::new(backend.clone());
        (backend, scores)
    }

    fn easy(turns: u32, time: u32) -> HighScoreRecord {
        HighScoreRecord::new(turns, time, 6)
    }

    #[test]
    fn score_value_weighs_turns_over_time() {
        assert_eq!(score_value(10, 45), 32.5);
        assert_eq!(easy(10, 45).score_value, 32.5);
    }

    #[test]
    fn empty_storage_reads_as_no_scores() {
        let (_, scores) = store();
        assert!(scores.get_scores(Difficulty::Easy).is_empty());
    }

    #[test]
    fn first_save_is_the_new_best() {
        let (_, scores) = store();
        assert!(scores.save_score(Difficulty::Easy, easy(10, 45)));
        let saved = scores.get_scores(Difficulty::Easy);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].score_value, 32.5);
        assert!(scores.get_scores(Difficulty::Medium).is_empty());
    }

    #[test]
    fn worse_result_is_saved_but_not_best() {
        let (_, scores) = store();
        scores.save_score(Difficulty::Easy, easy(8, 20));
        assert!(!scores.save_score(Difficulty::Easy, easy(12, 60)));
        let saved = scores.get_scores(Difficulty::Easy);
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].turns, 12);
    }

    #[test]
    fn equal_score_value_keeps_the_earlier_record_first() {
        let (_, scores) = store();
        let first = easy(10, 20);
        let first_id = first.id;
        scores.save_score(Difficulty::Easy, first);
        let mut tie = easy(10, 20);
        tie.date = scores.get_scores(Difficulty::Easy)[0].date.clone();
        assert!(!scores.save_score(Difficulty::Easy, tie));
        assert_eq!(scores.get_scores(Difficulty::Easy)[0].id, first_id);
    }

    #[test]
    fn list_is_capped_and_evicts_the_worst() {
        let (_, scores) = store();
        for turns in [20, 14, 16, 12, 18] {
            scores.save_score(Difficulty::Easy, easy(turns, 30));
        }
        assert!(scores.save_score(Difficulty::Easy, easy(6, 10)));

        let saved = scores.get_scores(Difficulty::Easy);
        assert_eq!(saved.len(), 5);
        assert_eq!(saved[0].turns, 6);
        assert!(saved.iter().all(|record| record.turns != 20));
        assert!(saved.windows(2).all(|w| w[0].score_value <= w[1].score_value));
    }

    #[test]
    fn incomplete_games_are_not_recorded() {
        let (_, scores) = store();
        assert!(!scores.save_score(Difficulty::Medium, HighScoreRecord::new(4, 10, 7)));
        assert!(scores.get_scores(Difficulty::Medium).is_empty());
    }

    #[test]
    fn corrupt_table_reads_empty_and_is_replaced_on_save() {
        let (backend, scores) = store();
        backend.set(HIGH_SCORES_KEY, "not json").unwrap();
        assert!(scores.get_scores(Difficulty::Easy).is_empty());
        assert!(scores.save_score(Difficulty::Easy, easy(10, 45)));
        assert_eq!(scores.get_scores(Difficulty::Easy).len(), 1);
    }

    #[test]
    fn corrupt_tier_does_not_hide_other_tiers() {
        let (backend, scores) = store();
        backend
            .set(
                HIGH_SCORES_KEY,
                r#"{"easy": "oops", "hard": [{"turns": 14, "time": 60, "score": 10, "scoreValue": 44.0, "date": "2024-05-01T10:00:00.000Z"}]}"#,
            )
            .unwrap();
        assert!(scores.get_scores(Difficulty::Easy).is_empty());
        let hard = scores.get_scores(Difficulty::Hard);
        assert_eq!(hard.len(), 1);
        assert!(hard[0].id.is_nil());
    }

    #[test]
    fn unknown_tiers_survive_a_save() {
        let (backend, scores) = store();
        backend.set(HIGH_SCORES_KEY, r#"{"expert": []}"#).unwrap();
        scores.save_score(Difficulty::Easy, easy(10, 45));
        let raw = backend.get(HIGH_SCORES_KEY).unwrap().unwrap();
        let table: Map<String, Value> = serde_json::from_str(&raw).unwrap();
        assert!(table.contains_key("expert"));
        assert!(table.contains_key("easy"));
    }

    #[test]
    fn persisted_fields_use_camel_case() {
        let (backend, scores) = store();
        scores.save_score(Difficulty::Easy, easy(10, 45));
        let raw = backend.get(HIGH_SCORES_KEY).unwrap().unwrap();
        assert!(raw.contains("\"scoreValue\":32.5"));
        assert!(raw.contains("\"time\":45"));
    }

    #[test]
    fn clear_removes_every_tier() {
        let (_, scores) = store();
        scores.save_score(Difficulty::Easy, easy(10, 45));
        scores.save_score(Difficulty::Hard, HighScoreRecord::new(15, 80, 10));
        scores.clear_scores();
        for difficulty in Difficulty::ALL {
            assert!(scores.get_scores(difficulty).is_empty());
        }
    }

    #[test]
    fn failing_backend_degrades_gracefully() {
        let scores = HighScoreStore::new(Rc::new(BrokenStore));
        assert!(scores.get_scores(Difficulty::Easy).is_empty());
        assert!(!scores.save_score(Difficulty::Easy, easy(10, 45)));
        assert!(scores.try_save_score(Difficulty::Easy, easy(10, 45)).is_err());
        scores.clear_scores();
    }
}
