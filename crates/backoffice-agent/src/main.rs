mod config;

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use backoffice_cache::{CacheChange, CacheKey, CacheStore, QueryCache};
use backoffice_chat::group_messages;
use backoffice_db::{Database, SqliteUnseen};
use backoffice_sync::handlers::{ChatMessageHandler, RoomCreatedHandler};
use backoffice_sync::{Session, Synchronizer, UnseenStore, WebSocketTransport};
use backoffice_types::{ChatMessage, EntityKind};

use config::AgentConfig;

/// Cache key each entity kind is kept under.
fn collection_key(entity: EntityKind) -> CacheKey {
    match entity {
        EntityKind::Chat => CacheKey::from(["chat"]),
        EntityKind::Shipment => CacheKey::from(["shipments"]),
        EntityKind::Rooms => CacheKey::from(["rooms"]),
        EntityKind::Route => CacheKey::from(["routes"]),
        EntityKind::Driver => CacheKey::from(["drivers"]),
    }
}

fn build_synchronizers(
    cache: Arc<dyn CacheStore>,
    unseen: Arc<dyn UnseenStore>,
    session: Option<&Session>,
) -> Vec<Synchronizer> {
    EntityKind::ALL
        .into_iter()
        .map(|entity| {
            let sync = Synchronizer::new(entity, collection_key(entity), cache.clone());
            match entity {
                EntityKind::Chat => {
                    let mut handler = ChatMessageHandler::new(cache.clone(), collection_key(entity));
                    if let Some(session) = session {
                        handler = handler.flag_unseen(unseen.clone(), session.identity());
                    }
                    sync.with_handler(handler.into_handler())
                }
                EntityKind::Rooms => sync.with_handler(
                    RoomCreatedHandler::new(
                        cache.clone(),
                        collection_key(entity),
                        collection_key(EntityKind::Shipment),
                    )
                    .flag_unseen(unseen.clone())
                    .into_handler(),
                ),
                _ => sync,
            }
        })
        .collect()
}

/// Log how a conversation renders after it changed.
fn describe_conversation(cache: &QueryCache, key: &CacheKey) {
    let Some(value) = cache.get_query_data(key) else {
        return;
    };
    let messages: Vec<ChatMessage> = match serde_json::from_value(value) {
        Ok(messages) => messages,
        Err(e) => {
            warn!("conversation {} holds unreadable messages: {}", key, e);
            return;
        }
    };
    let days = group_messages(&messages);
    let bubbles: usize = days.iter().map(|day| day.groups.len()).sum();
    info!(
        "conversation {}: {} messages in {} day(s), {} bubble group(s)",
        key,
        messages.len(),
        days.len(),
        bubbles
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backoffice=debug".into()),
        )
        .init();

    let config = AgentConfig::from_env()?;

    let session = config
        .access_token
        .as_deref()
        .map(Session::from_token)
        .transpose()?;
    match &session {
        Some(session) if session.is_expired() => warn!(
            "Access token for {} has expired, the updates server will likely refuse it",
            session.identity()
        ),
        Some(session) => info!("Signed in as {}", session.identity()),
        None => warn!("BACKOFFICE_ACCESS_TOKEN not set, connecting anonymously"),
    }

    let db = Arc::new(Database::open(&config.db_path)?);
    let unseen: Arc<dyn UnseenStore> = Arc::new(SqliteUnseen::new(db));

    let cache = QueryCache::new();
    let mut changes = cache.subscribe();
    let transport = WebSocketTransport::new(config.updates_url.clone(), config.reconnect_delay)?;

    let mut synchronizers = build_synchronizers(Arc::new(cache.clone()), unseen, session.as_ref());
    for sync in &mut synchronizers {
        sync.open(&transport, session.as_ref())?;
    }
    info!(
        "Watching {} for {} entity kinds",
        transport.endpoint(backoffice_types::UPDATES_NAMESPACE),
        synchronizers.len()
    );

    let chat_root = collection_key(EntityKind::Chat);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Ok(CacheChange::Updated(key)) if key.starts_with(&chat_root) => {
                    describe_conversation(&cache, &key);
                }
                Ok(CacheChange::Updated(key)) => debug!("cache updated: {}", key),
                Ok(CacheChange::Invalidated(prefix)) => debug!("cache invalidated: {}", prefix),
                Err(RecvError::Lagged(n)) => warn!("Cache change feed lagged by {} updates", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    for sync in &mut synchronizers {
        sync.close();
    }
    info!("Back-office agent stopped");
    Ok(())
}
