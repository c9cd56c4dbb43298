//! 内存存储：默认后端，也用于测试
//! In-memory store, the default backend and the test fixture

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::db::error::{DbError, Result};
use crate::model::role::default_hierarchy;
use crate::model::{
    AssignmentParticipant, AssignmentQuestionnaire, CascadeReport, ResponseMap, Role, TeamsUser,
    User,
};
use crate::repo::{KvStore, ParticipationRepository, Repository, RoleRepository, UserRepository};
use crate::{HealthCheck, HealthStatus};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    participants: Vec<AssignmentParticipant>,
    teams_users: Vec<TeamsUser>,
    questionnaires: Vec<AssignmentQuestionnaire>,
    response_maps: Vec<ResponseMap>,
    sets: HashMap<String, BTreeSet<String>>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn name_taken(&self, name: &str, except: i64) -> bool {
        self.users.values().any(|u| u.name == name && u.id != except)
    }
}

/// 所有表由同一把读写锁保护，复合操作因此是原子的
/// All tables sit behind one lock, so compound operations are atomic
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置五级默认角色 / Seeded with the default role hierarchy
    pub fn with_default_roles() -> Self {
        let store = Self::new();
        for role in default_hierarchy() {
            store.insert_role(role);
        }
        store
    }

    pub fn insert_role(&self, role: Role) {
        self.tables.write().roles.insert(role.id, role);
    }

    pub fn insert_participant(&self, user_id: i64, assignment_id: Option<i64>) -> i64 {
        let mut t = self.tables.write();
        let id = t.next_id();
        t.participants.push(AssignmentParticipant {
            id,
            user_id,
            assignment_id,
            handle: None,
        });
        id
    }

    pub fn insert_teams_user(&self, user_id: i64, team_id: Option<i64>) -> i64 {
        let mut t = self.tables.write();
        let id = t.next_id();
        t.teams_users.push(TeamsUser {
            id,
            team_id,
            user_id,
        });
        id
    }

    pub fn insert_response_map(&self, reviewer_id: i64, reviewee_id: i64) -> i64 {
        let mut t = self.tables.write();
        let id = t.next_id();
        t.response_maps.push(ResponseMap {
            id,
            reviewed_object_id: None,
            reviewer_id,
            reviewee_id,
        });
        id
    }

    pub fn participants_of(&self, user_id: i64) -> Vec<AssignmentParticipant> {
        self.tables
            .read()
            .participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn teams_users_of(&self, user_id: i64) -> Vec<TeamsUser> {
        self.tables
            .read()
            .teams_users
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Repository<User, i64> for MemoryStore {
    async fn create(&self, model: &User) -> Result<User> {
        let mut t = self.tables.write();
        if t.name_taken(&model.name, 0) {
            return Err(DbError::Conflict(format!("users.name = {}", model.name)));
        }
        let now = Utc::now();
        let mut user = model.clone();
        user.id = t.next_id();
        user.created_at = now;
        user.updated_at = now;
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn read_one(&self, pk: i64) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(&pk).cloned())
    }

    async fn read_all(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().users.values().cloned().collect())
    }

    async fn update(&self, model: &User) -> Result<u64> {
        let mut t = self.tables.write();
        if !t.users.contains_key(&model.id) {
            return Ok(0);
        }
        if t.name_taken(&model.name, model.id) {
            return Err(DbError::Conflict(format!("users.name = {}", model.name)));
        }
        let mut user = model.clone();
        user.updated_at = Utc::now();
        t.users.insert(user.id, user);
        Ok(1)
    }

    async fn delete(&self, pk: i64) -> Result<u64> {
        Ok(self.tables.write().users.remove(&pk).map_or(0, |_| 1))
    }

    async fn page(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let t = self.tables.read();
        Ok(t.users
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.tables.read().users.len() as i64)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.name == name)
            .cloned())
    }

    async fn search_by_name_prefix(
        &self,
        prefix: &str,
        role_ids: &[i64],
        or_user_id: i64,
    ) -> Result<Vec<User>> {
        let t = self.tables.read();
        let mut found: Vec<User> = t
            .users
            .values()
            .filter(|u| u.name.starts_with(prefix))
            .filter(|u| {
                u.id == or_user_id || u.role_id.is_some_and(|r| role_ids.contains(&r))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn delete_with_dependents(&self, id: i64) -> Result<CascadeReport> {
        let mut t = self.tables.write();
        if !t.users.contains_key(&id) {
            return Err(DbError::not_found("User", id));
        }

        let before = (t.participants.len(), t.teams_users.len(), t.questionnaires.len());
        t.participants.retain(|p| p.user_id != id);
        t.teams_users.retain(|r| r.user_id != id);
        t.questionnaires.retain(|q| q.user_id != Some(id));
        t.users.remove(&id);

        Ok(CascadeReport {
            participants: (before.0 - t.participants.len()) as u64,
            teams_users: (before.1 - t.teams_users.len()) as u64,
            questionnaires: (before.2 - t.questionnaires.len()) as u64,
        })
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn find(&self, id: i64) -> Result<Option<Role>> {
        Ok(self.tables.read().roles.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self
            .tables
            .read()
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn all(&self) -> Result<Vec<Role>> {
        Ok(self.tables.read().roles.values().cloned().collect())
    }
}

#[async_trait]
impl ParticipationRepository for MemoryStore {
    async fn count_participants(&self, user_id: i64) -> Result<i64> {
        Ok(self
            .tables
            .read()
            .participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .count() as i64)
    }

    async fn response_maps_for(&self, user_id: i64) -> Result<Vec<ResponseMap>> {
        Ok(self
            .tables
            .read()
            .response_maps
            .iter()
            .filter(|m| m.reviewer_id == user_id || m.reviewee_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_questionnaire(
        &self,
        row: &AssignmentQuestionnaire,
    ) -> Result<AssignmentQuestionnaire> {
        let mut t = self.tables.write();
        let mut row = row.clone();
        row.id = t.next_id();
        t.questionnaires.push(row.clone());
        Ok(row)
    }

    async fn questionnaires_for(&self, user_id: i64) -> Result<Vec<AssignmentQuestionnaire>> {
        Ok(self
            .tables
            .read()
            .questionnaires
            .iter()
            .filter(|q| q.user_id == Some(user_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn toggle_member(&self, key: &str, member: &str) -> Result<bool> {
        let mut t = self.tables.write();
        let set = t.sets.entry(key.to_string()).or_default();
        if set.remove(member) {
            Ok(false)
        } else {
            set.insert(member.to_string());
            Ok(true)
        }
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .sets
            .get(key)
            .is_some_and(|s| s.contains(member)))
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .read()
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn check_health(&self) -> HealthStatus {
        HealthStatus::healthy("memory_store")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, role_id: Option<i64>) -> User {
        User {
            name: name.to_string(),
            email: format!("{}@example.edu", name),
            role_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_ids_and_rejects_duplicate_names() {
        let store = MemoryStore::new();
        let a = store.create(&user("ann", Some(1))).await.unwrap();
        let b = store.create(&user("bob", Some(1))).await.unwrap();
        assert!(b.id > a.id);
        assert!(matches!(
            store.create(&user("ann", None)).await,
            Err(DbError::Conflict(_))
        ));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn page_is_ordered_by_id() {
        let store = MemoryStore::new();
        for name in ["c", "a", "b"] {
            store.create(&user(name, None)).await.unwrap();
        }
        let names: Vec<_> = store
            .page(2, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn prefix_search_is_scoped_and_sorted() {
        let store = MemoryStore::with_default_roles();
        let me = store.create(&user("stu_me", Some(5))).await.unwrap();
        store.create(&user("stu_b", Some(1))).await.unwrap();
        store.create(&user("stu_a", Some(2))).await.unwrap();
        store.create(&user("stu_admin", Some(4))).await.unwrap();
        store.create(&user("other", Some(1))).await.unwrap();

        let names: Vec<_> = store
            .search_by_name_prefix("stu", &[1, 2], me.id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["stu_a", "stu_b", "stu_me"]);
    }

    #[tokio::test]
    async fn cascade_removes_dependents_only_for_the_user() {
        let store = MemoryStore::new();
        let a = store.create(&user("a", None)).await.unwrap();
        let b = store.create(&user("b", None)).await.unwrap();
        store.insert_participant(a.id, Some(1));
        store.insert_participant(b.id, Some(1));
        store.insert_teams_user(a.id, Some(3));
        store
            .create_questionnaire(&AssignmentQuestionnaire::default_for(a.id))
            .await
            .unwrap();

        let report = store.delete_with_dependents(a.id).await.unwrap();
        assert_eq!(
            report,
            CascadeReport {
                participants: 1,
                teams_users: 1,
                questionnaires: 1
            }
        );
        assert!(store.read_one(a.id).await.unwrap().is_none());
        assert_eq!(store.count_participants(b.id).await.unwrap(), 1);
        assert!(matches!(
            store.delete_with_dependents(a.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn toggle_is_set_valued() {
        let store = MemoryStore::new();
        assert!(store.toggle_member("ips", "10.0.0.1").await.unwrap());
        assert!(store.toggle_member("ips", "10.0.0.2").await.unwrap());
        assert!(!store.toggle_member("ips", "10.0.0.1").await.unwrap());
        assert_eq!(store.members("ips").await.unwrap(), vec!["10.0.0.2"]);
        assert!(!store.is_member("ips", "10.0.0.1").await.unwrap());
    }
}
