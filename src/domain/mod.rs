// Domain module: problem data model, backend contract and event bridge

pub mod backend;
pub mod events;
pub mod models;
pub mod value_objects;

pub use backend::*;
pub use events::{progress_gap, EventCallback, EventData, EventEmitter, EventValue};
pub use models::*;
pub use value_objects::*;
