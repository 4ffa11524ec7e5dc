//! Test doubles for the poll engine ports.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use colab::{
    ActionReceipt, ColabError, Item, ItemFeed, ItemId, ItemStatus, ItemVoter, Tag, VoteDirection,
};

pub fn item(id: u64, tags: &[&str]) -> Item {
    Item {
        id: ItemId::from(id),
        title: format!("item {id}"),
        description: String::new(),
        tags: tags.iter().filter_map(Tag::new).collect::<BTreeSet<_>>(),
        status: ItemStatus::Pending,
        vote_count: 0,
        author: None,
        created_at: None,
        updated_at: None,
    }
}

/// Feed that replays scripted pages, then keeps returning the fallback page.
pub struct ScriptedFeed {
    pages: Mutex<VecDeque<Result<Vec<Item>, ColabError>>>,
    fallback: Vec<Item>,
    limits: Mutex<Vec<u32>>,
}

impl ScriptedFeed {
    /// Returns `page` on every call.
    pub fn repeating(page: Vec<Item>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::default(),
            fallback: page,
            limits: Mutex::default(),
        })
    }

    /// Returns each scripted result once, then empty pages.
    pub fn pages(pages: Vec<Result<Vec<Item>, ColabError>>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
            fallback: Vec::new(),
            limits: Mutex::default(),
        })
    }

    /// Limits passed to each fetch, in call order.
    pub fn limits(&self) -> Vec<u32> {
        self.limits.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.limits.lock().unwrap().len()
    }
}

#[async_trait]
impl ItemFeed for ScriptedFeed {
    async fn recent_items(&self, limit: u32) -> Result<Vec<Item>, ColabError> {
        self.limits.lock().unwrap().push(limit);
        let next = self.pages.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Voter that records every call and fails for one chosen item.
#[derive(Default)]
pub struct RecordingVoter {
    votes: Mutex<Vec<(ItemId, VoteDirection)>>,
    fail_on: Option<ItemId>,
}

impl RecordingVoter {
    pub fn failing_on(id: ItemId) -> Arc<Self> {
        Arc::new(Self {
            votes: Mutex::default(),
            fail_on: Some(id),
        })
    }

    pub fn votes(&self) -> Vec<(ItemId, VoteDirection)> {
        self.votes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ItemVoter for RecordingVoter {
    async fn cast_vote(
        &self,
        item: &ItemId,
        direction: VoteDirection,
    ) -> Result<ActionReceipt, ColabError> {
        self.votes.lock().unwrap().push((item.clone(), direction));
        if self.fail_on.as_ref() == Some(item) {
            return Err(ColabError::RemoteRejection {
                status: 409,
                message: "already voted".to_owned(),
                retry_after: None,
            });
        }
        Ok(ActionReceipt {
            success: Some(true),
            ..ActionReceipt::default()
        })
    }
}
