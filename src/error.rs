//! 错误类型
//!
//! 只有配置类错误（无法继续仿真）才会以 `SimError` 的形式出现；
//! 资源暂时不足、路径暂时不可用都不是错误，由调用方在下一步自动重试。

use thiserror::Error;

use crate::net::AppId;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown {kind} selector: {value}")]
    UnknownSelector { kind: &'static str, value: String },

    #[error("application {app:?} needs {tasks} cores but the cluster only has {total}")]
    ApplicationTooLarge { app: AppId, tasks: usize, total: usize },

    #[error("application {app:?}: {reason}")]
    StoragePlacement { app: AppId, reason: String },

    #[error("malformed workload: {0}")]
    Workload(String),

    #[error("invalid topology: {0}")]
    Topology(String),

    #[error("no progress possible at t={at}: {running} application(s) still running")]
    Deadlock { at: f64, running: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;
