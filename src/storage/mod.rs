//! In-memory article storage.
//!
//! This module defines the [`ArticleStore`], which owns every newsgroup and every article
//! known to the server. Groups map to an ordered list of article ids (posting order) and
//! articles are kept in a global id-indexed map.
//!
//! # Overview
//!
//! - Article ids are global across the store, start at `1` and strictly increase. An id is
//!   never handed out twice, even after a reload from a [`Snapshot`].
//! - Groups are created on demand: [`ArticleStore::add_article`] creates the target group
//!   when it does not exist yet. Groups are never removed.
//! - Articles are immutable once stored; lookups return owned clones so no caller ever
//!   holds the store lock across network I/O.
//!
//! All state sits behind a single [`Mutex`] that is only held for the duration of one
//! operation. Lookups signal absence with `None`/`0`, never with an error.
//!
//! # Example
//! ```rust
//! use usenet_sim::ArticleStore;
//!
//! let store = ArticleStore::new();
//! let id = store.add_article("comp.example", "Welcome", "admin@example", "Hello");
//!
//! assert_eq!(id, Some(1));
//! assert!(store.has_group("comp.example"));
//! assert_eq!(store.get_article_any(1).unwrap().subject, "Welcome");
//! ```
//!
//! # See Also
//! - [`backup`]: JSON persistence of a store snapshot.
pub mod backup;

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};

use log::trace;
use serde::{Deserialize, Serialize};

pub use backup::{BackupError, GroupRecord, Snapshot};

/// Globally unique article number.
pub type ArticleId = u64;

/// A posted message. Never modified once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub subject: String,
    pub from: String,
    /// Newline separated body text.
    pub body: String,
    /// Name of the owning group.
    pub group: String,
}

impl Article {
    /// Body split into lines, without terminators.
    pub fn body_lines(&self) -> impl Iterator<Item = &str> {
        self.body.lines()
    }
}

#[derive(Debug, Default)]
struct Group {
    name: String,
    articles: Vec<ArticleId>,
}

#[derive(Debug)]
struct StoreState {
    groups: Vec<Group>,
    index: HashMap<String, usize>,
    articles: BTreeMap<ArticleId, Article>,
    next_id: ArticleId,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
            articles: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl StoreState {
    fn group(&self, name: &str) -> Option<&Group> {
        self.index.get(name).map(|pos| &self.groups[*pos])
    }

    fn group_mut(&mut self, name: &str) -> &mut Group {
        let pos = match self.index.get(name) {
            Some(pos) => *pos,
            None => {
                trace!("creating group {name}");
                self.groups.push(Group {
                    name: name.to_string(),
                    articles: Vec::new(),
                });
                self.index.insert(name.to_string(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        &mut self.groups[pos]
    }
}

/// Shared owner of all groups and articles.
#[derive(Debug, Default)]
pub struct ArticleStore {
    inner: Mutex<StoreState>,
}

impl ArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty group unless one with `name` already exists.
    pub fn add_group(&self, name: &str) {
        self.state().group_mut(name);
    }

    /// Group names in creation order.
    pub fn list_groups(&self) -> Vec<String> {
        self.state().groups.iter().map(|g| g.name.clone()).collect()
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.state().index.contains_key(name)
    }

    /// Stores a new article and returns its id.
    ///
    /// The group is created first if it is unknown; this is the only way a group comes
    /// into existence through the protocol. The id counter and both maps are updated under
    /// one lock acquisition, so concurrent posts receive distinct, gap-free ids.
    ///
    /// Returns `None` without storing anything once the id space is exhausted.
    pub fn add_article(
        &self,
        group: &str,
        subject: &str,
        from: &str,
        body: &str,
    ) -> Option<ArticleId> {
        let mut state = self.state();
        let id = state.next_id;
        state.next_id = id.checked_add(1)?;

        state.group_mut(group).articles.push(id);
        state.articles.insert(
            id,
            Article {
                id,
                subject: subject.to_string(),
                from: from.to_string(),
                body: body.to_string(),
                group: group.to_string(),
            },
        );
        trace!("article {id} stored in {group}");
        Some(id)
    }

    /// Number of articles in `group`, `0` for unknown groups.
    pub fn count_articles(&self, group: &str) -> usize {
        self.state()
            .group(group)
            .map(|g| g.articles.len())
            .unwrap_or(0)
    }

    /// Looks up `id` only within `group`.
    pub fn get_article(&self, group: &str, id: ArticleId) -> Option<Article> {
        let state = self.state();
        let group = state.group(group)?;
        if !group.articles.contains(&id) {
            return None;
        }
        state.articles.get(&id).cloned()
    }

    /// Looks up `id` regardless of the owning group.
    pub fn get_article_any(&self, id: ArticleId) -> Option<Article> {
        self.state().articles.get(&id).cloned()
    }

    /// Total number of stored articles.
    pub fn len(&self) -> usize {
        self.state().articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The id the next posted article will receive.
    pub fn next_id(&self) -> ArticleId {
        self.state().next_id
    }

    /// Copies the full store into a consistent [`Snapshot`].
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state();
        Snapshot {
            groups: state
                .groups
                .iter()
                .map(|g| GroupRecord {
                    name: g.name.clone(),
                    articles: g.articles.clone(),
                })
                .collect(),
            articles: state.articles.clone(),
            next_id: state.next_id,
        }
    }

    /// Rebuilds a store from a [`Snapshot`].
    ///
    /// The id counter is raised past the highest stored id when the snapshot carries a
    /// stale value, so ids are never reused. A snapshot holding the largest possible id
    /// leaves no id to assign next and is rejected.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, BackupError> {
        let mut state = StoreState::default();
        for record in snapshot.groups {
            state.group_mut(&record.name).articles.extend(record.articles);
        }

        let highest = snapshot.articles.keys().next_back().copied().unwrap_or(0);
        let after_highest = highest
            .checked_add(1)
            .ok_or(BackupError::IdSpaceExhausted(highest))?;
        state.articles = snapshot.articles;
        state.next_id = snapshot.next_id.max(after_highest);

        Ok(Self {
            inner: Mutex::new(state),
        })
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        // Every mutation leaves the maps consistent before anything can panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
