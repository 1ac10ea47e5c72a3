//! 重试策略
//!
//! 所有"请求-等待"循环共用一个参数对象，不在调用点各写一套退避常量。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 退避增长方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Growth {
    /// 固定步长：base × attempt
    Fixed,
    /// 指数：base × 2^(attempt-1)
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub base_delay: Duration,
    pub growth: Growth,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, growth: Growth) -> Self {
        Self {
            max_attempts,
            base_delay,
            growth,
        }
    }

    /// 模拟 / 校验：尝试少、步长平缓
    pub fn interactive() -> Self {
        Self::new(3, Duration::from_millis(500), Growth::Fixed)
    }

    /// 提交：尝试多、指数退避
    pub fn submission() -> Self {
        Self::new(5, Duration::from_millis(400), Growth::Exponential)
    }

    /// 第 `attempt` 次尝试（从 1 开始）之前的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.growth {
            Growth::Fixed => self.base_delay.saturating_mul(attempt),
            Growth::Exponential => {
                // 2^31 以上没有意义，截断避免溢出
                let factor = 1u32 << (attempt - 1).min(31);
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    /// 整个循环最多等待多久
    pub fn total_budget(&self) -> Duration {
        (1..=self.max_attempts).map(|a| self.delay_for(a)).sum()
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
