//! Configuration: schema, persisted store, profiles, change subscriptions

pub mod profile;
pub mod schema;
pub mod store;
pub mod subscriptions;

pub use profile::{ProfileEntry, ProfileMap};
pub use schema::{ConfigKey, KeybindingAction, Rotation};
pub use store::ConfigStore;
pub use subscriptions::{Callback, OwnerId, SubscriptionId, SubscriptionRegistry};
