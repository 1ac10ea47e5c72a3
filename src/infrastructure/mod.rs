pub mod js_executor;
pub mod page_bridge;
pub mod storage;
pub mod surface;

pub use js_executor::JsExecutor;
pub use page_bridge::PageBridge;
pub use storage::{KeyValueStore, MemoryStore};
pub use surface::{MessagePort, SurfaceAddress};
