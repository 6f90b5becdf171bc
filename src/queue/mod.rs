pub mod dispatcher;

pub use dispatcher::{DispatchError, DispatchLoop, JobDispatcher, JobExecutor};
