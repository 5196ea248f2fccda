//! Match service (§4.6): per-game-type FIFO queues coalesced into rooms
//! by a periodic task, grounded on
//! `original_source/server/services/match_service.py`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use aether_games::GAME_CONFIGS;
use aether_protocol::UserId;

/// One queued `quick_match` request (§3 `Match request`).
#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub user_id: UserId,
    pub game_type: String,
    pub skill_rating: i32,
    enqueued_at: Instant,
}

impl MatchRequest {
    pub fn wait_time(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}

/// A batch of requests the coalescer decided to turn into a room.
#[derive(Debug, Clone)]
pub struct MatchBatch {
    pub game_type: String,
    pub requests: Vec<MatchRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("unsupported game type")]
    UnknownGameType,
    #[error("already queued for a match")]
    AlreadyQueued,
}

/// Owns the per-game-type queues. A user may be queued for at most one
/// game type at a time (mirrors the one-room-per-user invariant).
#[derive(Default)]
pub struct MatchService {
    queues: HashMap<String, VecDeque<MatchRequest>>,
    matching_users: HashSet<UserId>,
}

impl MatchService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a request (§4.6); returns the queue's new size.
    pub fn request_match(
        &mut self,
        user_id: UserId,
        game_type: impl Into<String>,
        skill_rating: i32,
    ) -> Result<usize, MatchError> {
        let game_type = game_type.into();
        if !GAME_CONFIGS.iter().any(|c| c.game_type == game_type) {
            return Err(MatchError::UnknownGameType);
        }
        if self.matching_users.contains(&user_id) {
            return Err(MatchError::AlreadyQueued);
        }
        let queue = self.queues.entry(game_type.clone()).or_default();
        queue.push_back(MatchRequest {
            user_id,
            game_type,
            skill_rating,
            enqueued_at: Instant::now(),
        });
        self.matching_users.insert(user_id);
        Ok(queue.len())
    }

    /// Removes a user from whichever queue they're in (§4.6 cancellation).
    pub fn cancel_match(&mut self, user_id: UserId) -> bool {
        if !self.matching_users.remove(&user_id) {
            return false;
        }
        for queue in self.queues.values_mut() {
            queue.retain(|r| r.user_id != user_id);
        }
        true
    }

    pub fn is_queued(&self, user_id: UserId) -> bool {
        self.matching_users.contains(&user_id)
    }

    /// One coalescer pass (§4.6 steps 1-2): for every queue, sort by
    /// skill rating then peel off ready-to-match batches from the front.
    /// Pure state transition — the caller is responsible for creating
    /// rooms and notifying users from the returned batches.
    pub fn coalesce(&mut self) -> Vec<MatchBatch> {
        let mut batches = Vec::new();
        for (game_type, queue) in self.queues.iter_mut() {
            let Some(cfg) = GAME_CONFIGS.iter().find(|c| c.game_type == *game_type) else {
                continue;
            };
            let mut sorted: Vec<MatchRequest> = queue.drain(..).collect();
            sorted.sort_by_key(|r| r.skill_rating);
            let mut remaining = VecDeque::from(sorted);

            while remaining.len() >= cfg.min_players {
                let take = cfg.max_players.min(remaining.len());
                let batch: Vec<MatchRequest> = remaining.drain(..take).collect();
                for r in &batch {
                    self.matching_users.remove(&r.user_id);
                }
                batches.push(MatchBatch { game_type: game_type.clone(), requests: batch });
            }
            *queue = remaining;
        }
        batches
    }

    /// Removes and returns requests that have waited past `timeout`
    /// (§4.6 step 5, §5 "match request timeout").
    pub fn expire_timeouts(&mut self, timeout: Duration) -> Vec<MatchRequest> {
        let mut expired = Vec::new();
        for queue in self.queues.values_mut() {
            let mut kept = VecDeque::new();
            for req in queue.drain(..) {
                if req.wait_time() > timeout {
                    expired.push(req);
                } else {
                    kept.push_back(req);
                }
            }
            *queue = kept;
        }
        for req in &expired {
            self.matching_users.remove(&req.user_id);
        }
        expired
    }
}
