pub mod cancel;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod worker_pool;

pub use cancel::CancelToken;
pub use coordinator::InitPhase;
pub use engine::{ChainEngine, Connection, Session};
pub use error::{GatewayError, InitError};
pub use gateway::{Gateway, process_one_batch};
pub use worker_pool::{WorkerPool, WorkerStats};
