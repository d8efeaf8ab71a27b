//! 应用模块
//!
//! 应用描述、任务事件与逐任务状态机，以及流量内核接口。

mod application;
mod event;
mod kernel;
mod task;

pub use application::Application;
pub use event::TaskEvent;
pub use kernel::{KernelSpec, TrafficKernel, validate};
pub use task::{Occurring, Step, TaskState};
