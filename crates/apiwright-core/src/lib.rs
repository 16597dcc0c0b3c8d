// ABOUTME: Core library for apiwright: the OpenAPI document model and everything that guards it.
// ABOUTME: Holds the document store, validation and save gates, persistence seam, and the document actor.

pub mod actor;
pub mod document;
pub mod persistence;
pub mod rules;
pub mod save;
pub mod store;
pub mod validation;

pub use actor::{ActorError, DocumentCommand, DocumentHandle, SavedChange};
pub use document::{
    ComponentKind, Components, Document, HttpMethod, Info, Operation, PathItem, Server, Tag,
};
pub use persistence::{PersistenceError, PersistenceGateway};
pub use rules::StructuralRules;
pub use save::{SaveError, SaveGate, SaveReport};
pub use store::{Change, DocumentStore, StoreError};
pub use validation::{Diagnostic, DiagnosticProducer, ValidationError, ValidationGate};
