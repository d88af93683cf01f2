pub mod dream;

pub use dream::{DreamRecord, Emotion, NewDream};
