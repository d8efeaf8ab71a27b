//! 仿真时间类型
//!
//! 流级仿真按连续时间推进，单位为抽象时间单位（与带宽的“字节 / 时间单位”一致）。

use std::fmt;
use std::ops::{Add, Sub};

use serde::Serialize;

/// 仿真时间。
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct SimTime(pub f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);
    /// 单步推进的下限
    pub const MIN_STEP: f64 = 1e-9;

    pub fn secs(self) -> f64 {
        self.0
    }

    pub fn total_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: f64) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

impl Sub for SimTime {
    type Output = f64;
    fn sub(self, rhs: SimTime) -> f64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}
