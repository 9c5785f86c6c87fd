use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};
use tokio::task::AbortHandle;

use crate::{auth, conversation};

#[derive(Clone)]
pub struct Ws {
    pub caller: auth::User,
    rooms: Arc<RwLock<HashMap<conversation::Id, AbortHandle>>>,
    typing_in: Arc<RwLock<HashSet<conversation::Id>>>,
    pub close: Arc<Notify>,
}

impl Ws {
    pub fn new(caller: auth::User) -> Self {
        Self {
            caller,
            rooms: Arc::new(RwLock::new(HashMap::new())),
            typing_in: Arc::new(RwLock::new(HashSet::new())),
            close: Arc::new(Notify::new()),
        }
    }
}

impl Ws {
    pub async fn is_joined(&self, id: &conversation::Id) -> bool {
        self.rooms.read().await.contains_key(id)
    }

    /// `forwarder` is the task relaying the room's subject into this session.
    pub async fn join(&self, id: conversation::Id, forwarder: AbortHandle) {
        if let Some(previous) = self.rooms.write().await.insert(id, forwarder) {
            previous.abort();
        }
    }

    pub async fn leave(&self, id: &conversation::Id) -> bool {
        match self.rooms.write().await.remove(id) {
            Some(forwarder) => {
                forwarder.abort();
                true
            }
            None => false,
        }
    }

    pub async fn start_typing(&self, id: conversation::Id) {
        self.typing_in.write().await.insert(id);
    }

    pub async fn stop_typing(&self, id: &conversation::Id) -> bool {
        self.typing_in.write().await.remove(id)
    }

    /// Stops every room forwarder and hands back the rooms this session was
    /// still typing in.
    pub async fn release(&self) -> Vec<conversation::Id> {
        for (_, forwarder) in self.rooms.write().await.drain() {
            forwarder.abort();
        }

        self.typing_in.write().await.drain().collect()
    }
}
