//! One agent session per conversation.
//!
//! The registry owns every live [`ChatSession`]. Sessions are built lazily on
//! the first message for a conversation and live until they are evicted on
//! idle timeout or `/reset`. Each session sits behind its own async mutex so a
//! turn holds it for its whole duration, while the map lock only guards
//! lookup and creation.

use std::collections::HashMap;
use std::sync::Arc;

use chack_ai::{AgentExecutor, AgentSpec, ExecutorFactory};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::settings::SessionSettings;
use crate::channel::{ChannelType, ConversationId};
use crate::memory::ShortTermMemoryWindow;

/// Heading placed before the stored record in a session's system prompt.
pub const LONG_TERM_MEMORY_HEADING: &str = "### LONG TERM MEMORY";

pub type SessionHandle = Arc<Mutex<ChatSession>>;

pub struct ChatSession {
    pub id: ConversationId,
    pub executor: Arc<dyn AgentExecutor>,
    pub window: ShortTermMemoryWindow,
    pub system_prompt: String,
    /// Creation time (Unix ms)
    pub created_at: i64,
    /// Time of the last completed turn (Unix ms)
    pub last_activity: i64,
}

impl ChatSession {
    pub fn touch(&mut self) {
        self.touch_at(Utc::now().timestamp_millis());
    }

    pub fn touch_at(&mut self, now_ms: i64) {
        self.last_activity = now_ms;
    }

    /// Whether more than `reset_minutes` passed since the last turn.
    /// Zero disables the timeout.
    pub fn is_idle(&self, reset_minutes: u64, now_ms: i64) -> bool {
        if reset_minutes == 0 {
            return false;
        }
        let limit_ms = i64::try_from(reset_minutes.saturating_mul(60_000)).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.last_activity) > limit_ms
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("messages", &self.window.len())
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity)
            .finish()
    }
}

/// System prompt for a new session.
pub fn build_system_prompt(base: &str, long_term_record: Option<&str>) -> String {
    match long_term_record.map(str::trim) {
        Some(record) if !record.is_empty() => {
            format!("{base}\n\n{LONG_TERM_MEMORY_HEADING}\n{record}")
        }
        _ => base.to_string(),
    }
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<ConversationId, SessionHandle>>,
    factory: Arc<dyn ExecutorFactory>,
    settings: HashMap<ChannelType, SessionSettings>,
    default_settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn ExecutorFactory>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory,
            settings: HashMap::new(),
            default_settings: SessionSettings::default(),
        }
    }

    /// Settings used for conversations on `channel`.
    pub fn with_settings(mut self, channel: ChannelType, settings: SessionSettings) -> Self {
        self.settings.insert(channel, settings);
        self
    }

    pub fn settings(&self, channel: ChannelType) -> &SessionSettings {
        self.settings.get(&channel).unwrap_or(&self.default_settings)
    }

    /// Return the session for `id`, building it on first use.
    ///
    /// The long-term record is read without holding the map lock; a racing
    /// caller that registers first wins and the other record is discarded.
    pub async fn get_or_create(&self, id: &ConversationId) -> SessionHandle {
        if let Some(existing) = self.get(id).await {
            return existing;
        }

        let record = self.load_record(id).await;

        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(id) {
            return existing.clone();
        }

        let session = self.build_session(id, record.as_deref());
        info!(
            conversation = %id,
            prompt_chars = session.system_prompt.chars().count(),
            "Created chat session"
        );
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id.clone(), handle.clone());
        handle
    }

    async fn load_record(&self, id: &ConversationId) -> Option<String> {
        let store = self.settings(id.channel).long_term.as_ref()?.store.clone();
        let key = id.clone();
        match tokio::task::spawn_blocking(move || store.load(&key)).await {
            Ok(Ok(record)) => Some(record),
            Ok(Err(e)) => {
                warn!(conversation = %id, error = %e, "Failed to load long-term memory");
                None
            }
            Err(e) => {
                warn!(conversation = %id, error = %e, "Long-term memory load task failed");
                None
            }
        }
    }

    fn build_session(&self, id: &ConversationId, record: Option<&str>) -> ChatSession {
        let settings = self.settings(id.channel);

        let system_prompt = build_system_prompt(&settings.system_prompt, record);
        let executor = self
            .factory
            .build(AgentSpec::new(system_prompt.clone(), settings.max_turns));
        let now = Utc::now().timestamp_millis();

        ChatSession {
            id: id.clone(),
            executor,
            window: ShortTermMemoryWindow::new(settings.window.clone()),
            system_prompt,
            created_at: now,
            last_activity: now,
        }
    }

    pub async fn get(&self, id: &ConversationId) -> Option<SessionHandle> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Remove the session for `id`; memory stores are left untouched.
    pub async fn evict(&self, id: &ConversationId) -> Option<SessionHandle> {
        let removed = self.sessions.lock().await.remove(id);
        if removed.is_some() {
            info!(conversation = %id, "Evicted chat session");
        }
        removed
    }

    pub async fn contains(&self, id: &ConversationId) -> bool {
        self.sessions.lock().await.contains_key(id)
    }

    /// Whether `handle` is still the registered session for `id`.
    pub async fn is_current(&self, id: &ConversationId, handle: &SessionHandle) -> bool {
        self.sessions
            .lock()
            .await
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub async fn identities(&self) -> Vec<ConversationId> {
        let mut ids: Vec<_> = self.sessions.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{LongTermMemoryStore, WindowConfig};
    use crate::session::settings::LongTermSettings;
    use crate::test_support::ScriptedFactory;
    use tempfile::tempdir;

    fn id(chat: &str) -> ConversationId {
        ConversationId::new(ChannelType::Telegram, chat)
    }

    fn registry(factory: &ScriptedFactory) -> SessionRegistry {
        SessionRegistry::new(Arc::new(factory.clone())).with_settings(
            ChannelType::Telegram,
            SessionSettings {
                system_prompt: "You are chack.".to_string(),
                max_turns: 75,
                window: WindowConfig::with_limit(4),
                ..SessionSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_session() {
        let factory = ScriptedFactory::default();
        let registry = registry(&factory);

        let first = registry.get_or_create(&id("1")).await;
        let second = registry.get_or_create(&id("1")).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
        assert_eq!(factory.specs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_per_identity() {
        let factory = ScriptedFactory::default();
        let registry = registry(&factory);

        let a = registry.get_or_create(&id("1")).await;
        let b = registry.get_or_create(&id("2")).await;
        let c = registry
            .get_or_create(&ConversationId::new(ChannelType::Discord, "1"))
            .await;

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_concurrent_creation_yields_one_session() {
        let factory = ScriptedFactory::default();
        let registry = Arc::new(registry(&factory));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.get_or_create(&id("same")).await
            }));
        }
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(factory.specs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_session_uses_channel_settings() {
        let factory = ScriptedFactory::default();
        let registry = registry(&factory);

        let handle = registry.get_or_create(&id("1")).await;
        let session = handle.lock().await;

        assert_eq!(session.system_prompt, "You are chack.");
        assert_eq!(session.executor.spec().max_turns, 75);
        assert_eq!(session.window.trigger(), 4);
    }

    #[tokio::test]
    async fn test_long_term_record_is_appended_to_prompt() {
        let dir = tempdir().unwrap();
        let store = LongTermMemoryStore::new(dir.path());
        store.save(&id("9"), "Prefers metric units.", 0).unwrap();

        let factory = ScriptedFactory::default();
        let registry = long_term_registry(&factory, store);

        let with_record = registry.get_or_create(&id("9")).await;
        assert_eq!(
            with_record.lock().await.system_prompt,
            "base\n\n### LONG TERM MEMORY\nPrefers metric units."
        );

        let without_record = registry.get_or_create(&id("10")).await;
        assert_eq!(without_record.lock().await.system_prompt, "base");
    }

    fn long_term_registry(factory: &ScriptedFactory, store: LongTermMemoryStore) -> SessionRegistry {
        SessionRegistry::new(Arc::new(factory.clone())).with_settings(
            ChannelType::Telegram,
            SessionSettings {
                system_prompt: "base".to_string(),
                long_term: Some(LongTermSettings {
                    store,
                    max_chars: 1500,
                }),
                ..SessionSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_concurrent_creation_with_long_term_store() {
        let dir = tempdir().unwrap();
        let store = LongTermMemoryStore::new(dir.path());
        store.save(&id("same"), "Works nights.", 0).unwrap();

        let factory = ScriptedFactory::default();
        let registry = Arc::new(long_term_registry(&factory, store));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.get_or_create(&id("same")).await
            }));
        }
        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        let specs = factory.specs().await;
        assert_eq!(specs.len(), 1);
        assert!(specs[0].system_prompt.ends_with("Works nights."));
    }

    #[tokio::test]
    async fn test_unreadable_record_falls_back_to_base_prompt() {
        let dir = tempdir().unwrap();
        let store = LongTermMemoryStore::new(dir.path());
        std::fs::create_dir_all(store.path_for(&id("5"))).unwrap();

        let factory = ScriptedFactory::default();
        let registry = long_term_registry(&factory, store);

        let handle = registry.get_or_create(&id("5")).await;
        assert_eq!(handle.lock().await.system_prompt, "base");
    }

    #[tokio::test]
    async fn test_evict_and_is_current() {
        let factory = ScriptedFactory::default();
        let registry = registry(&factory);

        let old = registry.get_or_create(&id("1")).await;
        assert!(registry.is_current(&id("1"), &old).await);

        let evicted = registry.evict(&id("1")).await.unwrap();
        assert!(Arc::ptr_eq(&old, &evicted));
        assert!(!registry.contains(&id("1")).await);
        assert!(!registry.is_current(&id("1"), &old).await);
        assert!(registry.evict(&id("1")).await.is_none());

        let fresh = registry.get_or_create(&id("1")).await;
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(!registry.is_current(&id("1"), &old).await);
    }

    #[tokio::test]
    async fn test_identities_sorted() {
        let factory = ScriptedFactory::default();
        let registry = registry(&factory);
        registry.get_or_create(&id("b")).await;
        registry.get_or_create(&id("a")).await;

        assert_eq!(registry.identities().await, vec![id("a"), id("b")]);
    }

    #[tokio::test]
    async fn test_idle_detection() {
        let factory = ScriptedFactory::default();
        let registry = registry(&factory);
        let handle = registry.get_or_create(&id("1")).await;
        let mut session = handle.lock().await;

        session.touch_at(0);
        let minute = 60_000;
        assert!(!session.is_idle(30, 10 * minute));
        assert!(!session.is_idle(30, 30 * minute));
        assert!(session.is_idle(30, 31 * minute));
        assert!(!session.is_idle(0, 1_000 * minute));
    }
}
