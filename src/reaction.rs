//! Optimistic reactions on a single displayed post.
//!
//! The view changes immediately on a like/unlike or a comment, the request
//! goes out, and then either the server's copy of the post replaces the local
//! guess (`confirm`) or the guess is undone (`rollback`).

use crate::model::post::{Like, Post};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeState {
    pub is_liked: bool,
    pub like_count: usize,
}

impl LikeState {
    pub fn compute(likes: &[Like], user_id: &str) -> Self {
        Self {
            is_liked: likes.iter().any(|like| like.user_id == user_id),
            like_count: likes.len(),
        }
    }
}

pub fn compute_like_state(post: &Post, user_id: &str) -> LikeState {
    LikeState::compute(&post.likes, user_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
    Like,
    Unlike,
}

impl LikeAction {
    pub fn toggle(state: LikeState) -> Self {
        if state.is_liked {
            LikeAction::Unlike
        } else {
            LikeAction::Like
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionPhase {
    Idle,
    OptimisticallyLiked,
    OptimisticallyUnliked,
    Reconciling,
    Error(String),
}

/// Number of mutations the server has acknowledged. A snapshot requested at
/// an older revision predates one of them and can't confirm it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Revision(u64);

impl Revision {
    fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeRequest {
    Create { post_id: String },
    Delete { like_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// State was updated optimistically; send this request.
    Request(LikeRequest),
    /// Nothing to do, state unchanged.
    Skipped,
    /// A previous mutation hasn't finished yet.
    Busy,
}

#[derive(Debug, Clone)]
pub struct LikeReconciler {
    post_id: String,
    user_id: String,
    likes: Vec<Like>,
    state: LikeState,
    prior: Option<LikeState>,
    pending: Option<LikeRequest>,
    phase: ReactionPhase,
    revision: Revision,
}

impl LikeReconciler {
    pub fn new(post: &Post, user_id: &str) -> Self {
        Self {
            post_id: post.id.clone(),
            user_id: user_id.to_string(),
            likes: post.likes.clone(),
            state: compute_like_state(post, user_id),
            prior: None,
            pending: None,
            phase: ReactionPhase::Idle,
            revision: Revision::default(),
        }
    }

    pub fn state(&self) -> LikeState {
        self.state
    }

    pub fn phase(&self) -> &ReactionPhase {
        &self.phase
    }

    /// Stamp for a snapshot request issued now.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn apply(&mut self, action: LikeAction) -> Applied {
        if let ReactionPhase::Error(..) = self.phase {
            self.phase = ReactionPhase::Idle;
        }
        if self.phase != ReactionPhase::Idle {
            return Applied::Busy;
        }

        let request = match action {
            LikeAction::Like if self.state.is_liked => return Applied::Skipped,
            LikeAction::Like => LikeRequest::Create {
                post_id: self.post_id.clone(),
            },
            LikeAction::Unlike => {
                // No like entity to delete means someone else already removed
                // it; leave the state for the next fetch to settle.
                match self.likes.iter().find(|like| like.user_id == self.user_id) {
                    Some(like) if self.state.is_liked => LikeRequest::Delete {
                        like_id: like.id.clone(),
                    },
                    _ => return Applied::Skipped,
                }
            }
        };

        self.prior = Some(self.state);
        match action {
            LikeAction::Like => {
                self.state.is_liked = true;
                self.state.like_count += 1;
                self.phase = ReactionPhase::OptimisticallyLiked;
            }
            LikeAction::Unlike => {
                self.state.is_liked = false;
                self.state.like_count = self.state.like_count.saturating_sub(1);
                self.phase = ReactionPhase::OptimisticallyUnliked;
            }
        }
        self.pending = Some(request.clone());
        Applied::Request(request)
    }

    /// The request went through. `created` is the like returned by a create
    /// call, kept so an unlike before the next fetch still has an id.
    pub fn network_ok(&mut self, created: Option<Like>) {
        if !self.is_optimistic() {
            return;
        }
        match self.pending.take() {
            Some(LikeRequest::Create { .. }) => self.likes.extend(created),
            Some(LikeRequest::Delete { like_id }) => self.likes.retain(|like| like.id != like_id),
            None => {}
        }
        self.prior = None;
        self.revision = self.revision.next();
        self.phase = ReactionPhase::Reconciling;
    }

    /// Replaces local state with the server snapshot. Ignored while a
    /// request is in flight, and for snapshots requested before the last
    /// acknowledged mutation.
    pub fn confirm(&mut self, snapshot: &Post, requested_at: Revision) -> bool {
        if snapshot.id != self.post_id || self.is_optimistic() || requested_at != self.revision {
            return false;
        }
        self.likes = snapshot.likes.clone();
        self.state = compute_like_state(snapshot, &self.user_id);
        self.prior = None;
        self.pending = None;
        self.phase = ReactionPhase::Idle;
        true
    }

    /// The confirmation fetch failed; keep what we have until the next one.
    pub fn settle(&mut self) {
        if self.phase == ReactionPhase::Reconciling {
            self.phase = ReactionPhase::Idle;
        }
    }

    pub fn rollback(&mut self, message: impl Into<String>) -> bool {
        if !self.is_optimistic() {
            return false;
        }
        if let Some(prior) = self.prior.take() {
            self.state = prior;
        }
        self.pending = None;
        self.phase = ReactionPhase::Error(message.into());
        true
    }

    pub fn take_error(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.phase, ReactionPhase::Idle) {
            ReactionPhase::Error(message) => Some(message),
            phase => {
                self.phase = phase;
                None
            }
        }
    }

    fn is_optimistic(&self) -> bool {
        matches!(
            self.phase,
            ReactionPhase::OptimisticallyLiked | ReactionPhase::OptimisticallyUnliked
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentPhase {
    Idle,
    Pending(CommentAction),
    Reconciling,
    Error(String),
}

/// Comment count of a displayed post, with at most one pending change.
#[derive(Debug, Clone)]
pub struct CommentReconciler {
    post_id: String,
    count: usize,
    prior: Option<usize>,
    phase: CommentPhase,
    revision: Revision,
}

impl CommentReconciler {
    pub fn new(post: &Post) -> Self {
        Self {
            post_id: post.id.clone(),
            count: post.comments.len(),
            prior: None,
            phase: CommentPhase::Idle,
            revision: Revision::default(),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn phase(&self) -> &CommentPhase {
        &self.phase
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn begin(&mut self, action: CommentAction) -> bool {
        if let CommentPhase::Error(..) = self.phase {
            self.phase = CommentPhase::Idle;
        }
        if self.phase != CommentPhase::Idle || (action == CommentAction::Remove && self.count == 0)
        {
            return false;
        }
        self.prior = Some(self.count);
        self.count = match action {
            CommentAction::Add => self.count + 1,
            CommentAction::Remove => self.count - 1,
        };
        self.phase = CommentPhase::Pending(action);
        true
    }

    pub fn network_ok(&mut self) {
        if let CommentPhase::Pending(..) = self.phase {
            self.prior = None;
            self.revision = self.revision.next();
            self.phase = CommentPhase::Reconciling;
        }
    }

    pub fn confirm(&mut self, snapshot: &Post, requested_at: Revision) -> bool {
        if snapshot.id != self.post_id
            || matches!(self.phase, CommentPhase::Pending(..))
            || requested_at != self.revision
        {
            return false;
        }
        self.count = snapshot.comments.len();
        self.prior = None;
        self.phase = CommentPhase::Idle;
        true
    }

    pub fn settle(&mut self) {
        if self.phase == CommentPhase::Reconciling {
            self.phase = CommentPhase::Idle;
        }
    }

    pub fn rollback(&mut self, message: impl Into<String>) -> bool {
        if !matches!(self.phase, CommentPhase::Pending(..)) {
            return false;
        }
        if let Some(prior) = self.prior.take() {
            self.count = prior;
        }
        self.phase = CommentPhase::Error(message.into());
        true
    }

    pub fn take_error(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.phase, CommentPhase::Idle) {
            CommentPhase::Error(message) => Some(message),
            phase => {
                self.phase = phase;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{author::Author, comment::Comment, post::fixtures::post_with_likes};

    fn like(id: &str, user_id: &str) -> Like {
        Like {
            id: id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    #[test]
    fn like_state_counts_and_detects_own_like() {
        let post = post_with_likes("p1", &[("l1", "u2"), ("l2", "u1"), ("l3", "u3")]);

        assert_eq!(
            compute_like_state(&post, "u1"),
            LikeState {
                is_liked: true,
                like_count: 3
            }
        );
        assert_eq!(
            compute_like_state(&post, "u9"),
            LikeState {
                is_liked: false,
                like_count: 3
            }
        );
        assert_eq!(compute_like_state(&post_with_likes("p1", &[]), "u1"), LikeState::default());
    }

    #[test]
    fn duplicate_likes_count_each_entry() {
        let post = post_with_likes("p1", &[("l1", "u1"), ("l2", "u1")]);
        let state = compute_like_state(&post, "u1");
        assert!(state.is_liked);
        assert_eq!(state.like_count, 2);
    }

    #[test]
    fn optimistic_like_reverts_on_failure() {
        let post = post_with_likes("p1", &[]);
        let mut reconciler = LikeReconciler::new(&post, "u1");

        let applied = reconciler.apply(LikeAction::Like);

        assert_eq!(
            applied,
            Applied::Request(LikeRequest::Create {
                post_id: "p1".to_string()
            })
        );
        assert_eq!(
            reconciler.state(),
            LikeState {
                is_liked: true,
                like_count: 1
            }
        );
        assert_eq!(reconciler.phase(), &ReactionPhase::OptimisticallyLiked);

        assert!(reconciler.rollback("network error"));
        assert_eq!(
            reconciler.state(),
            LikeState {
                is_liked: false,
                like_count: 0
            }
        );
        assert_eq!(reconciler.phase(), &ReactionPhase::Error("network error".to_string()));
        assert_eq!(reconciler.take_error().as_deref(), Some("network error"));
        assert_eq!(reconciler.phase(), &ReactionPhase::Idle);
    }

    #[test]
    fn unlike_without_own_like_is_skipped() {
        let post = post_with_likes("p1", &[("l1", "u2")]);
        let mut reconciler = LikeReconciler::new(&post, "u1");
        let before = reconciler.state();

        assert_eq!(reconciler.apply(LikeAction::Unlike), Applied::Skipped);
        assert_eq!(reconciler.state(), before);
        assert_eq!(reconciler.phase(), &ReactionPhase::Idle);
    }

    #[test]
    fn like_when_already_liked_is_skipped() {
        let post = post_with_likes("p1", &[("l1", "u1")]);
        let mut reconciler = LikeReconciler::new(&post, "u1");
        assert_eq!(reconciler.apply(LikeAction::Like), Applied::Skipped);
    }

    #[test]
    fn unlike_deletes_first_own_like() {
        let post = post_with_likes("p1", &[("l1", "u2"), ("l2", "u1"), ("l3", "u1")]);
        let mut reconciler = LikeReconciler::new(&post, "u1");

        let applied = reconciler.apply(LikeAction::toggle(reconciler.state()));

        assert_eq!(
            applied,
            Applied::Request(LikeRequest::Delete {
                like_id: "l2".to_string()
            })
        );
        assert_eq!(
            reconciler.state(),
            LikeState {
                is_liked: false,
                like_count: 2
            }
        );
        assert_eq!(reconciler.phase(), &ReactionPhase::OptimisticallyUnliked);
    }

    #[test]
    fn confirmation_takes_server_counts() {
        let post = post_with_likes("p1", &[("l1", "u2")]);
        let mut reconciler = LikeReconciler::new(&post, "u1");
        reconciler.apply(LikeAction::Like);

        // A snapshot arriving before the request finished is not trusted.
        let early = post_with_likes("p1", &[("l1", "u2")]);
        assert!(!reconciler.confirm(&early, reconciler.revision()));

        reconciler.network_ok(Some(like("l9", "u1")));
        assert_eq!(reconciler.phase(), &ReactionPhase::Reconciling);

        // Someone else liked meanwhile.
        let snapshot = post_with_likes("p1", &[("l1", "u2"), ("l8", "u3"), ("l9", "u1")]);
        assert!(reconciler.confirm(&snapshot, reconciler.revision()));
        assert_eq!(
            reconciler.state(),
            LikeState {
                is_liked: true,
                like_count: 3
            }
        );
        assert_eq!(reconciler.phase(), &ReactionPhase::Idle);
    }

    #[test]
    fn snapshot_requested_before_acknowledged_like_is_stale() {
        let post = post_with_likes("p1", &[("l1", "u2")]);
        let mut reconciler = LikeReconciler::new(&post, "u1");
        // Fetch goes out, then the like is sent and acknowledged before the
        // fetch answers.
        let requested_at = reconciler.revision();
        reconciler.apply(LikeAction::Like);
        reconciler.network_ok(Some(like("l9", "u1")));

        let stale = post_with_likes("p1", &[("l1", "u2")]);
        assert!(!reconciler.confirm(&stale, requested_at));
        assert_eq!(reconciler.phase(), &ReactionPhase::Reconciling);
        assert_eq!(
            reconciler.state(),
            LikeState {
                is_liked: true,
                like_count: 2
            }
        );
        assert_eq!(reconciler.apply(LikeAction::Like), Applied::Busy);

        let fresh = post_with_likes("p1", &[("l1", "u2"), ("l9", "u1")]);
        assert!(reconciler.confirm(&fresh, reconciler.revision()));
        assert_eq!(reconciler.phase(), &ReactionPhase::Idle);
        assert_eq!(reconciler.apply(LikeAction::Like), Applied::Skipped);
    }

    #[test]
    fn rolled_back_like_keeps_revision() {
        let post = post_with_likes("p1", &[]);
        let mut reconciler = LikeReconciler::new(&post, "u1");
        let requested_at = reconciler.revision();
        reconciler.apply(LikeAction::Like);
        reconciler.rollback("offline");
        reconciler.take_error();

        assert!(reconciler.confirm(&post_with_likes("p1", &[("l1", "u3")]), requested_at));
        assert_eq!(reconciler.state().like_count, 1);
    }

    #[test]
    fn settled_like_can_be_undone_with_returned_id() {
        let post = post_with_likes("p1", &[]);
        let mut reconciler = LikeReconciler::new(&post, "u1");
        reconciler.apply(LikeAction::Like);
        reconciler.network_ok(Some(like("l9", "u1")));
        reconciler.settle();

        assert_eq!(
            reconciler.apply(LikeAction::Unlike),
            Applied::Request(LikeRequest::Delete {
                like_id: "l9".to_string()
            })
        );
    }

    #[test]
    fn second_action_while_in_flight_is_busy() {
        let post = post_with_likes("p1", &[]);
        let mut reconciler = LikeReconciler::new(&post, "u1");
        reconciler.apply(LikeAction::Like);

        assert_eq!(reconciler.apply(LikeAction::Unlike), Applied::Busy);
        reconciler.network_ok(None);
        assert_eq!(reconciler.apply(LikeAction::Unlike), Applied::Busy);
    }

    #[test]
    fn error_returns_to_idle_on_next_action() {
        let post = post_with_likes("p1", &[]);
        let mut reconciler = LikeReconciler::new(&post, "u1");
        reconciler.apply(LikeAction::Like);
        reconciler.rollback("offline");

        assert!(matches!(reconciler.apply(LikeAction::Like), Applied::Request(..)));
    }

    #[test]
    fn snapshot_of_other_post_is_ignored() {
        let post = post_with_likes("p1", &[]);
        let mut reconciler = LikeReconciler::new(&post, "u1");
        let revision = reconciler.revision();
        assert!(!reconciler.confirm(&post_with_likes("p2", &[("l1", "u1")]), revision));
        assert_eq!(reconciler.state(), LikeState::default());
    }

    #[test]
    fn rollback_outside_optimistic_phase_is_noop() {
        let post = post_with_likes("p1", &[("l1", "u1")]);
        let mut reconciler = LikeReconciler::new(&post, "u1");
        assert!(!reconciler.rollback("late"));
        assert_eq!(reconciler.phase(), &ReactionPhase::Idle);
        assert!(reconciler.take_error().is_none());
    }

    #[test]
    fn comment_count_follows_pending_change() {
        let post = post_with_likes("p1", &[]);
        let mut comments = CommentReconciler::new(&post);

        assert!(!comments.begin(CommentAction::Remove));
        assert!(comments.begin(CommentAction::Add));
        assert_eq!(comments.count(), 1);
        assert!(!comments.begin(CommentAction::Add));

        assert!(comments.rollback("offline"));
        assert_eq!(comments.count(), 0);
        assert_eq!(comments.take_error().as_deref(), Some("offline"));

        assert!(comments.begin(CommentAction::Add));
        comments.network_ok();
        assert_eq!(comments.phase(), &CommentPhase::Reconciling);
        comments.settle();
        assert_eq!(comments.phase(), &CommentPhase::Idle);
        assert_eq!(comments.count(), 1);
    }

    #[test]
    fn stale_snapshot_does_not_reset_comment_count() {
        let post = post_with_likes("p1", &[]);
        let mut comments = CommentReconciler::new(&post);
        let requested_at = comments.revision();
        comments.begin(CommentAction::Add);
        comments.network_ok();

        assert!(!comments.confirm(&post, requested_at));
        assert_eq!(comments.count(), 1);
        assert_eq!(comments.phase(), &CommentPhase::Reconciling);

        let mut fresh = post_with_likes("p1", &[]);
        fresh.comments.push(Comment {
            id: "c1".to_string(),
            author: Author::default(),
            body: "great track".to_string(),
            created_at: Utc::now(),
        });
        assert!(comments.confirm(&fresh, comments.revision()));
        assert_eq!(comments.phase(), &CommentPhase::Idle);
        assert_eq!(comments.count(), 1);
    }
}
