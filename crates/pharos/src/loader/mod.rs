pub mod image;
pub mod module;
pub mod preload;
pub mod task;

pub use image::{ImageLoadOptions, ImageLoader, ImagePhase, ImageTask};
pub use module::{LoadHandle, LoadOptions, ModuleLoader};
pub use preload::{HintKind, HintSink, MemoryHintSink, Preloader, ResourceHint};
pub use task::{Backoff, LoadState, LoaderStats, RetryPolicy};
