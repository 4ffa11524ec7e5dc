//! One fetch-filter-dispatch pass.
//!
//! For each fetched item, in the order the platform returned them:
//!
//! 1. skip it if the Seen-Set already holds its id;
//! 2. otherwise mark it seen (whether or not it will match);
//! 3. if its tags match the interests, await the handler with
//!    [`Activity::NewItem`], then run any auto-actions.
//!
//! A handler error or panic ends the cycle with [`ColabError::Handler`]. The
//! failing item stays marked seen; items after it in the same page are left
//! unmarked and are reconsidered by the next cycle.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use colab::{Activity, ColabError, Interests, ItemFeed, ItemId, ItemVoter, SeenSet, VoteDirection};
use futures::FutureExt;
use tracing::{debug, instrument, warn};

use crate::{ActivityHandler, AutoActions, PollConfig};

/// Counters from one [`PollCycle::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Items returned by the feed.
    pub fetched: usize,
    /// Items not previously seen.
    pub fresh: usize,
    /// Items handed to the handler.
    pub dispatched: usize,
}

/// Fetch, dedup, filter, and dispatch state for one subscriber.
pub struct PollCycle {
    feed: Arc<dyn ItemFeed>,
    handler: Arc<dyn ActivityHandler>,
    voter: Option<Arc<dyn ItemVoter>>,
    seen: SeenSet,
    interests: Interests,
    page_size: u32,
    auto_actions: AutoActions,
}

impl PollCycle {
    pub fn new(
        feed: Arc<dyn ItemFeed>,
        handler: Arc<dyn ActivityHandler>,
        config: &PollConfig,
    ) -> Self {
        let seen = match config.seen_capacity() {
            Some(cap) => SeenSet::with_capacity_limit(cap),
            None => SeenSet::unbounded(),
        };
        Self {
            feed,
            handler,
            voter: None,
            seen,
            interests: config.interests().clone(),
            page_size: config.page_size(),
            auto_actions: config.auto_actions(),
        }
    }

    /// Supplies the voter used by [`AutoActions::UpvoteMatches`].
    pub fn with_voter(mut self, voter: Arc<dyn ItemVoter>) -> Self {
        self.voter = Some(voter);
        self
    }

    /// `false` when an auto-action is configured that has nothing to act with.
    pub fn auto_actions_ready(&self) -> bool {
        match self.auto_actions {
            AutoActions::None => true,
            AutoActions::UpvoteMatches => self.voter.is_some(),
        }
    }

    pub fn interests(&self) -> &Interests {
        &self.interests
    }

    /// Replaces the interest set. Takes effect from the next [`run`](Self::run).
    pub fn set_interests(&mut self, interests: Interests) {
        self.interests = interests;
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Runs one pass and reports what happened.
    #[instrument(skip_all, fields(page_size = self.page_size, interests = %self.interests))]
    pub async fn run(&mut self) -> Result<CycleReport, ColabError> {
        let items = self.feed.recent_items(self.page_size).await?;
        let mut report = CycleReport {
            fetched: items.len(),
            ..CycleReport::default()
        };

        for item in items {
            if !self.seen.observe(&item.id) {
                continue;
            }
            report.fresh += 1;

            if !self.interests.matches(&item.tags) {
                debug!(item_id = %item.id, "item does not match interests");
                continue;
            }

            let id = item.id.clone();
            self.dispatch(Activity::NewItem(item)).await?;
            report.dispatched += 1;
            self.run_auto_actions(&id).await;
        }

        debug!(
            fetched = report.fetched,
            fresh = report.fresh,
            dispatched = report.dispatched,
            "poll cycle complete"
        );
        Ok(report)
    }

    async fn dispatch(&self, activity: Activity) -> Result<(), ColabError> {
        let kind = activity.kind();
        let id = activity.item().id.clone();
        debug!(item_id = %id, kind, "dispatching activity");

        match AssertUnwindSafe(self.handler.handle(activity))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(ColabError::Handler {
                message: format!("{kind} {id}: {error}"),
            }),
            Err(panic) => Err(ColabError::Handler {
                message: format!("{kind} {id}: handler panicked: {}", panic_message(&*panic)),
            }),
        }
    }

    async fn run_auto_actions(&self, id: &ItemId) {
        if self.auto_actions != AutoActions::UpvoteMatches {
            return;
        }
        let Some(voter) = &self.voter else {
            warn!(item_id = %id, "auto-upvote configured without a voter; skipping");
            return;
        };
        if let Err(error) = voter.cast_vote(id, VoteDirection::Up).await {
            warn!(item_id = %id, %error, "auto-upvote failed");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
