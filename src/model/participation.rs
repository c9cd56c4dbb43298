// 与用户关联的课程参与记录 / Course participation rows that reference a user
use serde::Serialize;
use utoipa::ToSchema;

/// 默认通知阈值（百分比） / default notification threshold, percent
pub const DEFAULT_NOTIFICATION_LIMIT: i32 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AssignmentParticipant {
    pub id: i64,
    pub user_id: i64,
    pub assignment_id: Option<i64>,
    pub handle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TeamsUser {
    pub id: i64,
    pub team_id: Option<i64>,
    pub user_id: i64,
}

/// 只填 user_id 的记录为讲师/管理员提供默认通知设置
/// A row holding only user_id gives instructors/administrators their default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AssignmentQuestionnaire {
    pub id: i64,
    pub user_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub questionnaire_id: Option<i64>,
    pub notification_limit: i32,
    pub questionnaire_weight: i32,
}

impl AssignmentQuestionnaire {
    pub fn default_for(user_id: i64) -> Self {
        Self {
            id: 0,
            user_id: Some(user_id),
            assignment_id: None,
            questionnaire_id: None,
            notification_limit: DEFAULT_NOTIFICATION_LIMIT,
            questionnaire_weight: 0,
        }
    }
}

/// 评审关系 / Review relation between reviewer and reviewee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow, ToSchema)]
pub struct ResponseMap {
    pub id: i64,
    pub reviewed_object_id: Option<i64>,
    pub reviewer_id: i64,
    pub reviewee_id: i64,
}

/// 删除用户时一并移除的依赖行数 / Dependent rows removed with a user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub participants: u64,
    pub teams_users: u64,
    pub questionnaires: u64,
}
