//! 黑板层：Binding 与单流程共享的类型化键值存储

pub mod binding;
pub mod store;

pub use binding::{default_variable_name, Binding, ANY_TYPE};
pub use store::{Blackboard, Entry};
