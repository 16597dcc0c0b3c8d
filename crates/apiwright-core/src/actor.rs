// ABOUTME: Document actor: one task owns the document store and save gate, fed by an mpsc command channel.
// ABOUTME: Serializes every mutation and save for a conversation; DocumentHandle is the cloneable front end.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::document::{ComponentKind, Document, HttpMethod, Info, Operation, Server, Tag};
use crate::persistence::{PersistenceError, PersistenceGateway};
use crate::save::{SaveError, SaveGate, SaveReport};
use crate::store::{Change, DocumentStore, StoreError};
use crate::validation::{Diagnostic, ValidationError, ValidationGate};

#[derive(Debug, Error)]
pub enum ActorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("document actor channel closed")]
    ChannelClosed,
}

/// A single mutation of the working document.
#[derive(Debug, Clone)]
pub enum DocumentCommand {
    UpsertComponent {
        kind: ComponentKind,
        name: String,
        value: Value,
    },
    RemoveComponent {
        kind: ComponentKind,
        name: String,
    },
    UpsertOperation {
        path: String,
        method: HttpMethod,
        operation: Box<Operation>,
    },
    RemoveOperation {
        path: String,
        method: HttpMethod,
    },
    SetInfo(Box<Info>),
    SetServers(Vec<Server>),
    SetTags(Vec<Tag>),
    Replace(Box<Document>),
}

impl DocumentCommand {
    fn apply(self, store: &mut DocumentStore) -> Result<Change, StoreError> {
        match self {
            DocumentCommand::UpsertComponent { kind, name, value } => {
                store.upsert_component(kind, &name, value)
            }
            DocumentCommand::RemoveComponent { kind, name } => store.remove_component(kind, &name),
            DocumentCommand::UpsertOperation {
                path,
                method,
                operation,
            } => store.upsert_operation(&path, method, *operation),
            DocumentCommand::RemoveOperation { path, method } => {
                store.remove_operation(&path, method)
            }
            DocumentCommand::SetInfo(info) => store.set_info(*info),
            DocumentCommand::SetServers(servers) => store.set_servers(servers),
            DocumentCommand::SetTags(tags) => store.set_tags(tags),
            DocumentCommand::Replace(document) => store.replace(*document),
        }
    }
}

/// Outcome of a mutation followed by a gated save.
#[derive(Debug)]
pub struct SavedChange {
    pub change: Change,
    pub save: Result<SaveReport, SaveError>,
}

enum Request {
    Apply {
        command: DocumentCommand,
        reply: oneshot::Sender<Result<Change, StoreError>>,
    },
    ApplyAndSave {
        command: DocumentCommand,
        reply: oneshot::Sender<Result<SavedChange, StoreError>>,
    },
    Save {
        only_if_dirty: bool,
        reply: oneshot::Sender<Result<SaveReport, SaveError>>,
    },
    Validate {
        reply: oneshot::Sender<Result<Vec<Diagnostic>, ActorError>>,
    },
}

/// Cloneable handle to a running document actor.
#[derive(Clone)]
pub struct DocumentHandle {
    tx: mpsc::Sender<Request>,
    store: Arc<RwLock<DocumentStore>>,
    pub conversation_id: String,
}

impl DocumentHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.ok()?;
        rx.await.ok()
    }

    /// Apply a mutation without saving.
    pub async fn apply(&self, command: DocumentCommand) -> Result<Change, ActorError> {
        self.request(|reply| Request::Apply { command, reply })
            .await
            .ok_or(ActorError::ChannelClosed)?
            .map_err(ActorError::from)
    }

    /// Apply a mutation, then save it through the gate in the same queue slot.
    /// The save is skipped when the document is already saved at this revision.
    pub async fn apply_and_save(&self, command: DocumentCommand) -> Result<SavedChange, ActorError> {
        self.request(|reply| Request::ApplyAndSave { command, reply })
            .await
            .ok_or(ActorError::ChannelClosed)?
            .map_err(ActorError::from)
    }

    /// Validate and write, even when nothing changed since the last save.
    pub async fn save(&self) -> Result<SaveReport, SaveError> {
        self.request(|reply| Request::Save {
            only_if_dirty: false,
            reply,
        })
        .await
        .ok_or(SaveError::ChannelClosed)?
    }

    /// Validate and write only if the document changed since the last save.
    pub async fn save_if_dirty(&self) -> Result<SaveReport, SaveError> {
        self.request(|reply| Request::Save {
            only_if_dirty: true,
            reply,
        })
        .await
        .ok_or(SaveError::ChannelClosed)?
    }

    /// Filtered diagnostics for the current document.
    pub async fn validate(&self) -> Result<Vec<Diagnostic>, ActorError> {
        self.request(|reply| Request::Validate { reply })
            .await
            .ok_or(ActorError::ChannelClosed)?
    }

    /// A snapshot of the current document.
    pub async fn document(&self) -> Result<Document, StoreError> {
        self.store.read().await.get().cloned()
    }

    pub async fn revision(&self) -> u64 {
        self.store.read().await.revision()
    }
}

/// Spawn the actor over an already-populated store.
pub fn spawn(conversation_id: impl Into<String>, store: DocumentStore, save_gate: SaveGate) -> DocumentHandle {
    let (tx, rx) = mpsc::channel(64);
    let store = Arc::new(RwLock::new(store));
    let conversation_id = conversation_id.into();

    let actor = DocumentActor {
        store: Arc::clone(&store),
        rx,
        save_gate,
        conversation_id: conversation_id.clone(),
    };
    tokio::spawn(actor.run());

    DocumentHandle {
        tx,
        store,
        conversation_id,
    }
}

/// Read the stored document through `gateway` and spawn an actor owning it.
pub async fn open(
    conversation_id: impl Into<String>,
    gateway: Arc<dyn PersistenceGateway>,
    validation: ValidationGate,
) -> Result<DocumentHandle, PersistenceError> {
    let document = gateway.read().await?;
    let mut save_gate = SaveGate::new(validation, gateway);
    save_gate.mark_saved(0);
    Ok(spawn(conversation_id, DocumentStore::loaded(document), save_gate))
}

struct DocumentActor {
    store: Arc<RwLock<DocumentStore>>,
    rx: mpsc::Receiver<Request>,
    save_gate: SaveGate,
    conversation_id: String,
}

impl DocumentActor {
    async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            // Ignore send errors: the caller may have dropped their receiver
            match request {
                Request::Apply { command, reply } => {
                    let _ = reply.send(self.apply(command).await);
                }
                Request::ApplyAndSave { command, reply } => {
                    let result = match self.apply(command).await {
                        Ok(change) => Ok(SavedChange {
                            change,
                            save: self.save(true).await,
                        }),
                        Err(e) => Err(e),
                    };
                    let _ = reply.send(result);
                }
                Request::Save {
                    only_if_dirty,
                    reply,
                } => {
                    let _ = reply.send(self.save(only_if_dirty).await);
                }
                Request::Validate { reply } => {
                    let _ = reply.send(self.validate().await);
                }
            }
        }
        tracing::debug!(conversation_id = %self.conversation_id, "document actor stopped");
    }

    async fn apply(&mut self, command: DocumentCommand) -> Result<Change, StoreError> {
        let mut store = self.store.write().await;
        let change = command.apply(&mut store)?;
        tracing::debug!(
            conversation_id = %self.conversation_id,
            revision = store.revision(),
            ?change,
            "applied document command"
        );
        Ok(change)
    }

    async fn snapshot(&self) -> Result<(Document, u64), StoreError> {
        let store = self.store.read().await;
        Ok((store.get()?.clone(), store.revision()))
    }

    async fn save(&mut self, only_if_dirty: bool) -> Result<SaveReport, SaveError> {
        let (document, revision) = self.snapshot().await.map_err(|_| SaveError::NotLoaded)?;
        if only_if_dirty {
            self.save_gate.save_if_dirty(&document, revision).await
        } else {
            self.save_gate.save(&document, revision).await
        }
    }

    async fn validate(&self) -> Result<Vec<Diagnostic>, ActorError> {
        let (document, _) = self.snapshot().await?;
        Ok(self.save_gate.validation().validate(&document).await?)
    }
}
