// World state: tracked lab entities

mod entity;
mod store;

pub use entity::Entity;
pub use store::{EntityStore, StoreSnapshot};
