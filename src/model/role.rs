//! 角色模型与层级计算 / Role model and hierarchy helpers

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

pub const SUPER_ADMINISTRATOR: &str = "Super-Administrator";
pub const ADMINISTRATOR: &str = "Administrator";
pub const INSTRUCTOR: &str = "Instructor";
pub const TEACHING_ASSISTANT: &str = "Teaching Assistant";
pub const STUDENT: &str = "Student";

/// 占位角色名（用户未分配角色时） / Placeholder name for users without a role
pub const NO_ROLE: &str = "(none)";

/// 角色记录 / Role row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow, ToSchema)]
pub struct Role {
    pub id: i64,
    pub name: String,
    /// 直接上级（更宽泛）的角色 / immediate broader role
    pub parent_id: Option<i64>,
    pub description: Option<String>,
}

impl Role {
    /// 未分配角色的占位对象，没有父角色
    /// Placeholder for a user without a role; it has no parent
    pub fn none() -> Self {
        Self {
            id: 0,
            name: NO_ROLE.to_string(),
            parent_id: None,
            description: None,
        }
    }

    pub fn is_student(&self) -> bool {
        self.name == STUDENT
    }

    /// 沿 parent_id 链可到达的角色 id（不含自身，防环）
    /// Ids reachable along the parent_id chain, excluding self, cycle-safe
    pub fn available_role_ids(&self, all: &[Role]) -> Vec<i64> {
        let by_id: HashMap<i64, &Role> = all.iter().map(|r| (r.id, r)).collect();
        let mut seen = HashSet::new();
        seen.insert(self.id);
        let mut ids = Vec::new();
        let mut current = self.parent_id;
        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            match by_id.get(&id) {
                Some(role) => {
                    ids.push(role.id);
                    current = role.parent_id;
                }
                None => break,
            }
        }
        ids
    }
}

/// 默认的五级角色层级（内存存储的种子数据）
/// Default five-level hierarchy used to seed the memory store
pub fn default_hierarchy() -> Vec<Role> {
    let names = [
        (1, STUDENT, None, "Enrolled in courses"),
        (2, TEACHING_ASSISTANT, Some(1), "Assists instructors"),
        (3, INSTRUCTOR, Some(2), "Teaches courses"),
        (4, ADMINISTRATOR, Some(3), "Manages instructors"),
        (5, SUPER_ADMINISTRATOR, Some(4), "Manages the whole site"),
    ];
    names
        .into_iter()
        .map(|(id, name, parent_id, description)| Role {
            id,
            name: name.to_string(),
            parent_id,
            description: Some(description.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_roles_follow_parent_chain() {
        let roles = default_hierarchy();
        let instructor = roles.iter().find(|r| r.name == INSTRUCTOR).unwrap();
        assert_eq!(instructor.available_role_ids(&roles), vec![2, 1]);

        let student = roles.iter().find(|r| r.name == STUDENT).unwrap();
        assert!(student.available_role_ids(&roles).is_empty());
    }

    #[test]
    fn available_roles_stop_on_cycles_and_gaps() {
        let roles = vec![
            Role {
                id: 1,
                name: "a".into(),
                parent_id: Some(2),
                description: None,
            },
            Role {
                id: 2,
                name: "b".into(),
                parent_id: Some(1),
                description: None,
            },
            Role {
                id: 3,
                name: "c".into(),
                parent_id: Some(99),
                description: None,
            },
        ];
        assert_eq!(roles[0].available_role_ids(&roles), vec![2]);
        assert!(roles[2].available_role_ids(&roles).is_empty());
    }

    #[test]
    fn placeholder_role_has_no_parent() {
        let none = Role::none();
        assert_eq!(none.name, NO_ROLE);
        assert!(none.parent_id.is_none());
        assert!(!none.is_student());
    }
}
