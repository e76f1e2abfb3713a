//! QoS：重试策略、分层解析与带退避的重试执行器

pub mod policy;
pub mod retry;

pub use policy::{AgentQosSection, QosPolicy, QosResolver, QosSection, QosSettings};
pub use retry::{RetryExecutor, RetryOutcome};
