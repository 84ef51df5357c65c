// Name-only projection of the definition store, one list per visibility class.
// Lists are newest first. Local mutators only run after the store acknowledged
// the matching operation.

use autotest_common::store::{DefinitionStore, StoreResult};
use autotest_common::types::{TaskId, TestAddress, Visibility};
use futures_util::future::join;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSummaryCache {
    hidden: Vec<String>,
    sample: Vec<String>,
}

impl TestSummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch both lists from the store
    pub async fn load<S>(store: &S, task: &TaskId) -> StoreResult<Self>
    where
        S: DefinitionStore + ?Sized,
    {
        let (hidden, sample) = join(
            store.list_names(task, Visibility::Hidden),
            store.list_names(task, Visibility::Sample),
        )
        .await;
        let cache = Self {
            hidden: hidden?,
            sample: sample?,
        };
        debug!(
            task = %task,
            hidden = cache.hidden.len(),
            sample = cache.sample.len(),
            "Summaries loaded"
        );
        Ok(cache)
    }

    pub fn names(&self, visibility: Visibility) -> &[String] {
        match visibility {
            Visibility::Hidden => &self.hidden,
            Visibility::Sample => &self.sample,
        }
    }

    pub fn contains(&self, address: &TestAddress) -> bool {
        self.names(address.visibility).contains(&address.name)
    }

    fn names_mut(&mut self, visibility: Visibility) -> &mut Vec<String> {
        match visibility {
            Visibility::Hidden => &mut self.hidden,
            Visibility::Sample => &mut self.sample,
        }
    }

    /// Prepend a newly created test
    pub fn add_local(&mut self, name: &str, visibility: Visibility) {
        let names = self.names_mut(visibility);
        names.retain(|n| n != name);
        names.insert(0, name.to_string());
    }

    pub fn remove_local(&mut self, name: &str, visibility: Visibility) -> bool {
        let names = self.names_mut(visibility);
        let before = names.len();
        names.retain(|n| n != name);
        names.len() != before
    }

    /// Reflect an edit. Same class: replaced in place. Class change: moved to
    /// the front of the new class.
    pub fn rename_local(&mut self, old: &TestAddress, new: &TestAddress) {
        if old.visibility == new.visibility {
            let names = self.names_mut(old.visibility);
            match names.iter().position(|n| n == &old.name) {
                Some(index) => names[index] = new.name.clone(),
                None => names.insert(0, new.name.clone()),
            }
        } else {
            self.remove_local(&old.name, old.visibility);
            self.add_local(&new.name, new.visibility);
        }
    }
}
