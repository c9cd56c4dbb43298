//! 当前会话与角色检查 / Current session and role checks

use crate::model::role::{
    ADMINISTRATOR, INSTRUCTOR, STUDENT, SUPER_ADMINISTRATOR, TEACHING_ASSISTANT,
};
use crate::model::{Role, User};
use crate::service::outcome::Outcome;

/// 可以管理用户的角色 / Roles allowed to manage users
pub const STAFF_ROLES: [&str; 4] = [
    SUPER_ADMINISTRATOR,
    ADMINISTRATOR,
    INSTRUCTOR,
    TEACHING_ASSISTANT,
];

/// 控制器动作 / Controller actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Index,
    List,
    Show,
    ShowSelection,
    New,
    Create,
    Edit,
    Update,
    Destroy,
    Keys,
    AutoComplete,
    SetAnonymizedView,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Index => "index",
            Action::List => "list",
            Action::Show => "show",
            Action::ShowSelection => "show_selection",
            Action::New => "new",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Update => "update",
            Action::Destroy => "destroy",
            Action::Keys => "keys",
            Action::AutoComplete => "auto_complete_for_user_name",
            Action::SetAnonymizedView => "set_anonymized_view",
        }
    }
}

/// 角色的首页 / Home destination for a role name
pub fn home_path(role_name: &str) -> &'static str {
    match role_name {
        STUDENT => "/student_task/list",
        name if STAFF_ROLES.contains(&name) => "/tree_display/list",
        _ => "/",
    }
}

/// 当前登录用户 / The logged-in user making the request
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub role: Role,
    pub remote_ip: String,
}

impl Session {
    pub fn role_name(&self) -> &str {
        &self.role.name
    }

    pub fn is_student(&self) -> bool {
        self.role.is_student()
    }

    pub fn home_path(&self) -> &'static str {
        home_path(self.role_name())
    }

    pub fn action_allowed(&self, action: Action) -> bool {
        match action {
            Action::Keys => self.is_student(),
            _ => STAFF_ROLES.contains(&self.role_name()),
        }
    }

    /// 不允许时返回回首页的重定向 / Redirect home when the action is not allowed
    pub fn deny(&self, action: Action) -> Option<Outcome> {
        if self.action_allowed(action) {
            return None;
        }
        Some(
            Outcome::redirect(self.home_path())
                .with_error(format!("You are not allowed to {} this user.", action.name())),
        )
    }

    /// 学生只能访问自己的记录；id 缺失同样回首页
    /// Students may only open their own record; a missing id also goes home
    pub fn must_go_home(&self, id: Option<i64>) -> bool {
        match id {
            None => true,
            Some(id) => self.is_student() && id != self.user.id,
        }
    }

    /// 目标用户是否对当前用户可见 / Whether the target user is visible
    pub fn can_view(&self, target: &User, target_role: &Role) -> bool {
        can_view(&self.user, target, target_role)
    }
}

/// 目标角色没有父角色，或父角色 id 小于操作者角色 id，或就是本人
/// Visible when the target role has no parent, its parent id is below the
/// actor's role id, or the target is the actor
pub fn can_view(actor: &User, target: &User, target_role: &Role) -> bool {
    match target_role.parent_id {
        None => true,
        Some(parent) => actor.role_id.is_some_and(|own| parent < own) || target.id == actor.id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::default_hierarchy;

    fn role(name: &str) -> Role {
        default_hierarchy()
            .into_iter()
            .find(|r| r.name == name)
            .unwrap()
    }

    fn session(id: i64, role_name: &str) -> Session {
        let role = role(role_name);
        Session {
            user: User {
                id,
                name: format!("u{}", id),
                role_id: Some(role.id),
                ..Default::default()
            },
            role,
            remote_ip: "127.0.0.1".into(),
        }
    }

    #[test]
    fn keys_is_student_only() {
        assert!(session(1, STUDENT).action_allowed(Action::Keys));
        assert!(!session(1, INSTRUCTOR).action_allowed(Action::Keys));
        assert!(!session(1, STUDENT).action_allowed(Action::List));
        for name in STAFF_ROLES {
            assert!(session(1, name).action_allowed(Action::Destroy));
        }
    }

    #[test]
    fn denial_names_the_action_and_goes_home() {
        let out = session(1, STUDENT).deny(Action::Destroy).unwrap();
        assert_eq!(out.location(), Some("/student_task/list"));
        assert_eq!(
            out.flash.error.as_deref(),
            Some("You are not allowed to destroy this user.")
        );
        assert!(session(1, ADMINISTRATOR).deny(Action::Destroy).is_none());
    }

    #[test]
    fn home_paths() {
        assert_eq!(home_path(STUDENT), "/student_task/list");
        assert_eq!(home_path(TEACHING_ASSISTANT), "/tree_display/list");
        assert_eq!(home_path(SUPER_ADMINISTRATOR), "/tree_display/list");
        assert_eq!(home_path("Guest"), "/");
    }

    #[test]
    fn visibility_truth_table() {
        let instructor = session(10, INSTRUCTOR);
        let target = |id: i64, role_name: &str| {
            let r = role(role_name);
            (
                User {
                    id,
                    role_id: Some(r.id),
                    ..Default::default()
                },
                r,
            )
        };

        // Student has no parent role
        let (u, r) = target(20, STUDENT);
        assert!(instructor.can_view(&u, &r));
        // TA parent (1) < Instructor (3)
        let (u, r) = target(21, TEACHING_ASSISTANT);
        assert!(instructor.can_view(&u, &r));
        // Instructor parent (2) < 3
        let (u, r) = target(22, INSTRUCTOR);
        assert!(instructor.can_view(&u, &r));
        // Administrator parent (3) is not < 3
        let (u, r) = target(23, ADMINISTRATOR);
        assert!(!instructor.can_view(&u, &r));
        // but oneself is always visible
        let (u, r) = target(instructor.user.id, ADMINISTRATOR);
        assert!(instructor.can_view(&u, &r));
        // a user without role gets the placeholder role
        assert!(instructor.can_view(&User::default(), &Role::none()));
    }

    #[test]
    fn actor_without_role_only_sees_parentless_roles_and_self() {
        let actor = User {
            id: 5,
            role_id: None,
            ..Default::default()
        };
        let ta = role(TEACHING_ASSISTANT);
        let other = User {
            id: 6,
            ..Default::default()
        };
        assert!(!can_view(&actor, &other, &ta));
        assert!(can_view(&actor, &actor, &ta));
        assert!(can_view(&actor, &other, &role(STUDENT)));
    }

    #[test]
    fn students_are_kept_to_their_own_record() {
        let s = session(7, STUDENT);
        assert!(s.must_go_home(None));
        assert!(s.must_go_home(Some(8)));
        assert!(!s.must_go_home(Some(7)));
        assert!(!session(7, INSTRUCTOR).must_go_home(Some(8)));
    }
}
