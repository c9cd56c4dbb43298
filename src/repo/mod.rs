//! 仓库层：业务服务只依赖这里的 Trait，具体实现为内存存储或 PostgreSQL。
//! Repository layer: services depend on these traits only; implementations
//! are the memory store and PostgreSQL.

use async_trait::async_trait;

use crate::db::error::Result;
use crate::model::{AssignmentQuestionnaire, CascadeReport, ResponseMap, Role, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// 通用仓库 Trait，约定标准 CRUD 操作。
#[async_trait]
pub trait Repository<T, PK>: Send + Sync {
    /// 创建记录，返回带主键的新记录
    async fn create(&self, model: &T) -> Result<T>;

    /// 读取一条记录（按主键）
    async fn read_one(&self, pk: PK) -> Result<Option<T>>;

    /// 读取所有记录
    async fn read_all(&self) -> Result<Vec<T>>;

    /// 更新记录（按主键），返回影响行数
    async fn update(&self, model: &T) -> Result<u64>;

    /// 删除记录（按主键），返回影响行数
    async fn delete(&self, pk: PK) -> Result<u64>;

    /// 分页读取（按主键升序）
    async fn page(&self, limit: i64, offset: i64) -> Result<Vec<T>>;

    /// 记录总数
    async fn count(&self) -> Result<i64>;
}

/// 用户仓库 / User repository
#[async_trait]
pub trait UserRepository: Repository<User, i64> {
    /// 按用户名精确查找
    async fn find_by_name(&self, name: &str) -> Result<Option<User>>;

    /// 名称前缀匹配，且角色在 `role_ids` 中或 id 等于 `or_user_id`
    /// Prefix match restricted to `role_ids`, or the user `or_user_id`
    async fn search_by_name_prefix(
        &self,
        prefix: &str,
        role_ids: &[i64],
        or_user_id: i64,
    ) -> Result<Vec<User>>;

    /// 删除用户及其参与、组队、问卷记录
    /// Remove a user along with participant, team and questionnaire rows
    async fn delete_with_dependents(&self, id: i64) -> Result<CascadeReport>;
}

/// 角色仓库（只读） / Role repository, read-only
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find(&self, id: i64) -> Result<Option<Role>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>>;
    async fn all(&self) -> Result<Vec<Role>>;
}

/// 课程参与相关查询 / Participation queries
#[async_trait]
pub trait ParticipationRepository: Send + Sync {
    async fn count_participants(&self, user_id: i64) -> Result<i64>;
    async fn response_maps_for(&self, user_id: i64) -> Result<Vec<ResponseMap>>;
    async fn create_questionnaire(
        &self,
        row: &AssignmentQuestionnaire,
    ) -> Result<AssignmentQuestionnaire>;
    async fn questionnaires_for(&self, user_id: i64) -> Result<Vec<AssignmentQuestionnaire>>;
}

/// 键值集合存储 / Named string-set store
///
/// `toggle_member` 必须是原子的。
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 切换成员：不存在则加入，存在则移除；返回切换后是否存在
    /// Toggle membership, returning whether the member is present afterwards
    async fn toggle_member(&self, key: &str, member: &str) -> Result<bool>;
    async fn is_member(&self, key: &str, member: &str) -> Result<bool>;
    async fn members(&self, key: &str) -> Result<Vec<String>>;
}
