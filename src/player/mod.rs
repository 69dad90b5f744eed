pub mod audio;
pub mod engine;
pub mod item;
pub mod queue;
pub mod source;
