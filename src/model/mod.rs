//! 用户中心模型定义
//!
//! - User: 用户信息
//! - Role: 角色信息与层级
//! - AssignmentParticipant / TeamsUser / AssignmentQuestionnaire / ResponseMap:
//!   引用用户的课程记录

pub mod participation;
pub mod role;
pub mod user;

pub use participation::*;
pub use role::Role;
pub use user::{FieldError, User, UserParams};
