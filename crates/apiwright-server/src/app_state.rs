// ABOUTME: Shared application state for the apiwright HTTP server.
// ABOUTME: Caches one session per conversation and one document actor per stored document.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use apiwright_agent::{ModelTransport, Session};
use apiwright_core::{DocumentHandle, PersistenceError, ValidationGate, actor};
use apiwright_store::Storage;
use tokio::sync::{Mutex, RwLock};

use crate::config::ApiwrightConfig;

/// Cached conversations kept before idle ones are evicted.
pub const DEFAULT_MAX_CONVERSATIONS: usize = 256;

/// A conversation's session plus the lock that keeps its turns one at a time.
pub struct Conversation {
    pub session: Session,
    pub turn: Mutex<()>,
}

struct CachedConversation {
    conversation: Arc<Conversation>,
    /// Storage key of the document actor this session edits.
    document_key: String,
    last_used: AtomicU64,
}

pub struct AppState {
    pub storage: Storage,
    pub transport: Arc<dyn ModelTransport>,
    pub validation: ValidationGate,
    pub model: String,
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub max_conversations: usize,
    conversations: RwLock<HashMap<String, CachedConversation>>,
    /// Document actors keyed by storage location, so conversations sharing a file share one actor.
    /// Lock order: `documents` before `conversations`.
    documents: Mutex<HashMap<String, DocumentHandle>>,
    clock: AtomicU64,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        storage: Storage,
        transport: Arc<dyn ModelTransport>,
        validation: ValidationGate,
        model: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            transport,
            validation,
            model: model.into(),
            api_base_url: api_base_url.into(),
            auth_token: None,
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
            conversations: RwLock::new(HashMap::new()),
            documents: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    pub fn from_config(
        config: &ApiwrightConfig,
        transport: Arc<dyn ModelTransport>,
    ) -> Result<Self, PersistenceError> {
        let storage = Storage::open(&config.storage)?;
        let mut state = Self::new(
            storage,
            transport,
            config.validation_gate(),
            config.model.model.clone(),
            config.api_base_url.clone(),
        );
        state.auth_token = config.auth_token.clone();
        state.max_conversations = config.max_conversations;
        Ok(state)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The conversation's session, opened on first use.
    pub async fn conversation(&self, conversation_id: &str) -> Result<Arc<Conversation>, PersistenceError> {
        if let Some(found) = self.conversations.read().await.get(conversation_id) {
            found.last_used.store(self.tick(), Ordering::Relaxed);
            return Ok(Arc::clone(&found.conversation));
        }

        let mut documents = self.documents.lock().await;
        let gateway = self.storage.gateway(conversation_id);
        let key = gateway.describe();
        let document = match documents.get(&key) {
            Some(handle) => handle.clone(),
            None => {
                let handle = actor::open(conversation_id, gateway, self.validation.clone()).await?;
                tracing::info!(conversation_id, storage = %key, "loaded document");
                documents.insert(key.clone(), handle.clone());
                handle
            }
        };

        let mut conversations = self.conversations.write().await;
        if let Some(found) = conversations.get(conversation_id) {
            found.last_used.store(self.tick(), Ordering::Relaxed);
            return Ok(Arc::clone(&found.conversation));
        }

        let conversation = Arc::new(Conversation {
            session: Session::with_document(
                conversation_id,
                document,
                Arc::clone(&self.transport),
                &self.model,
            ),
            turn: Mutex::new(()),
        });
        conversations.insert(
            conversation_id.to_string(),
            CachedConversation {
                conversation: Arc::clone(&conversation),
                document_key: key,
                last_used: AtomicU64::new(self.tick()),
            },
        );
        self.evict_idle(&mut conversations, &mut documents);
        Ok(conversation)
    }

    /// Drop least recently used conversations nobody is holding until the cache fits,
    /// then drop document actors no cached conversation edits anymore.
    fn evict_idle(
        &self,
        conversations: &mut HashMap<String, CachedConversation>,
        documents: &mut HashMap<String, DocumentHandle>,
    ) {
        let excess = conversations.len().saturating_sub(self.max_conversations);
        if excess == 0 {
            return;
        }

        let mut idle: Vec<(u64, String)> = conversations
            .iter()
            .filter(|(_, cached)| Arc::strong_count(&cached.conversation) == 1)
            .map(|(id, cached)| (cached.last_used.load(Ordering::Relaxed), id.clone()))
            .collect();
        idle.sort_unstable();
        for (_, id) in idle.into_iter().take(excess) {
            conversations.remove(&id);
            tracing::debug!(conversation_id = %id, "evicted idle conversation");
        }

        let in_use: HashSet<&str> = conversations
            .values()
            .map(|cached| cached.document_key.as_str())
            .collect();
        documents.retain(|key, _| in_use.contains(key.as_str()));
    }

    /// Number of cached conversations and loaded document actors.
    pub async fn cache_sizes(&self) -> (usize, usize) {
        let documents = self.documents.lock().await.len();
        let conversations = self.conversations.read().await.len();
        (conversations, documents)
    }
}
