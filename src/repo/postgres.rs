//! PostgreSQL 存储（sqlx） / PostgreSQL store backed by sqlx

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::debug;

use crate::db::connection::begin_tx;
use crate::db::error::{DbError, Result};
use crate::model::{AssignmentQuestionnaire, CascadeReport, ResponseMap, Role, User};
use crate::repo::{KvStore, ParticipationRepository, Repository, RoleRepository, UserRepository};
use crate::{HealthCheck, HealthStatus};

const USER_COLUMNS: &str = "id, name, fullname, email, role_id, parent_id, institution_id, \
    crypted_password, password_salt, private_by_default, mru_directory_path, email_on_review, \
    email_on_submission, email_on_review_of_review, is_new_user, master_permission_granted, \
    handle, digital_certificate, persistence_token, timezonepref, public_key, copy_of_emails, \
    created_at, updated_at";

/// 唯一约束冲突的 SQLSTATE
const UNIQUE_VIOLATION: &str = "23505";

fn map_write_error(e: sqlx::Error) -> DbError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            DbError::Conflict(db.message().to_string())
        }
        _ => DbError::Sqlx(e),
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// 执行建表脚本 / Apply the bundled schema
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(crate::cmd::SCHEMA_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Repository<User, i64> for PgStore {
    async fn create(&self, model: &User) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (name, fullname, email, role_id, parent_id, institution_id, \
             crypted_password, password_salt, private_by_default, mru_directory_path, \
             email_on_review, email_on_submission, email_on_review_of_review, is_new_user, \
             master_permission_granted, handle, digital_certificate, persistence_token, \
             timezonepref, public_key, copy_of_emails) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&model.name)
            .bind(&model.fullname)
            .bind(&model.email)
            .bind(model.role_id)
            .bind(model.parent_id)
            .bind(model.institution_id)
            .bind(&model.crypted_password)
            .bind(&model.password_salt)
            .bind(model.private_by_default)
            .bind(&model.mru_directory_path)
            .bind(model.email_on_review)
            .bind(model.email_on_submission)
            .bind(model.email_on_review_of_review)
            .bind(model.is_new_user)
            .bind(model.master_permission_granted)
            .bind(&model.handle)
            .bind(&model.digital_certificate)
            .bind(&model.persistence_token)
            .bind(&model.timezonepref)
            .bind(&model.public_key)
            .bind(model.copy_of_emails)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn read_one(&self, pk: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(pk)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn read_all(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update(&self, model: &User) -> Result<u64> {
        let res = sqlx::query(
            "UPDATE users SET name = $2, fullname = $3, email = $4, role_id = $5, \
             parent_id = $6, institution_id = $7, crypted_password = $8, password_salt = $9, \
             private_by_default = $10, mru_directory_path = $11, email_on_review = $12, \
             email_on_submission = $13, email_on_review_of_review = $14, is_new_user = $15, \
             master_permission_granted = $16, handle = $17, digital_certificate = $18, \
             persistence_token = $19, timezonepref = $20, public_key = $21, \
             copy_of_emails = $22, updated_at = NOW() WHERE id = $1",
        )
        .bind(model.id)
        .bind(&model.name)
        .bind(&model.fullname)
        .bind(&model.email)
        .bind(model.role_id)
        .bind(model.parent_id)
        .bind(model.institution_id)
        .bind(&model.crypted_password)
        .bind(&model.password_salt)
        .bind(model.private_by_default)
        .bind(&model.mru_directory_path)
        .bind(model.email_on_review)
        .bind(model.email_on_submission)
        .bind(model.email_on_review_of_review)
        .bind(model.is_new_user)
        .bind(model.master_permission_granted)
        .bind(&model.handle)
        .bind(&model.digital_certificate)
        .bind(&model.persistence_token)
        .bind(&model.timezonepref)
        .bind(&model.public_key)
        .bind(model.copy_of_emails)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(res.rows_affected())
    }

    async fn delete(&self, pk: i64) -> Result<u64> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(pk)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn page(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count(&self) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE name = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn search_by_name_prefix(
        &self,
        prefix: &str,
        role_ids: &[i64],
        or_user_id: i64,
    ) -> Result<Vec<User>> {
        // LIKE 通配符需转义
        let pattern = format!(
            "{}%",
            prefix
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        let sql = format!(
            "SELECT {} FROM users WHERE name LIKE $1 AND (role_id = ANY($2) OR id = $3) \
             ORDER BY name",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(pattern)
            .bind(role_ids)
            .bind(or_user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_with_dependents(&self, id: i64) -> Result<CascadeReport> {
        let mut tx = begin_tx(&self.pool).await?;

        let participants = sqlx::query("DELETE FROM assignment_participants WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let teams_users = sqlx::query("DELETE FROM teams_users WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let questionnaires =
            sqlx::query("DELETE FROM assignment_questionnaires WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        let removed = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await.map_err(|e| DbError::Tx(e.to_string()))?;
            return Err(DbError::not_found("User", id));
        }
        tx.commit().await.map_err(|e| DbError::Tx(e.to_string()))?;

        debug!(id, participants, teams_users, questionnaires, "user removed");
        Ok(CascadeReport {
            participants,
            teams_users,
            questionnaires,
        })
    }
}

#[async_trait]
impl RoleRepository for PgStore {
    async fn find(&self, id: i64) -> Result<Option<Role>> {
        Ok(sqlx::query_as::<_, Role>(
            "SELECT id, name, parent_id, description FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(sqlx::query_as::<_, Role>(
            "SELECT id, name, parent_id, description FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn all(&self) -> Result<Vec<Role>> {
        Ok(sqlx::query_as::<_, Role>(
            "SELECT id, name, parent_id, description FROM roles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl ParticipationRepository for PgStore {
    async fn count_participants(&self, user_id: i64) -> Result<i64> {
        let (n,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM assignment_participants WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(n)
    }

    async fn response_maps_for(&self, user_id: i64) -> Result<Vec<ResponseMap>> {
        Ok(sqlx::query_as::<_, ResponseMap>(
            "SELECT id, reviewed_object_id, reviewer_id, reviewee_id FROM response_maps \
             WHERE reviewee_id = $1 OR reviewer_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_questionnaire(
        &self,
        row: &AssignmentQuestionnaire,
    ) -> Result<AssignmentQuestionnaire> {
        Ok(sqlx::query_as::<_, AssignmentQuestionnaire>(
            "INSERT INTO assignment_questionnaires \
             (user_id, assignment_id, questionnaire_id, notification_limit, questionnaire_weight) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, assignment_id, questionnaire_id, notification_limit, \
             questionnaire_weight",
        )
        .bind(row.user_id)
        .bind(row.assignment_id)
        .bind(row.questionnaire_id)
        .bind(row.notification_limit)
        .bind(row.questionnaire_weight)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn questionnaires_for(&self, user_id: i64) -> Result<Vec<AssignmentQuestionnaire>> {
        Ok(sqlx::query_as::<_, AssignmentQuestionnaire>(
            "SELECT id, user_id, assignment_id, questionnaire_id, notification_limit, \
             questionnaire_weight FROM assignment_questionnaires WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl KvStore for PgStore {
    async fn toggle_member(&self, key: &str, member: &str) -> Result<bool> {
        let mut tx = begin_tx(&self.pool).await?;
        let removed = sqlx::query("DELETE FROM kv_set_members WHERE set_key = $1 AND member = $2")
            .bind(key)
            .bind(member)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            sqlx::query(
                "INSERT INTO kv_set_members (set_key, member) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(key)
            .bind(member)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await.map_err(|e| DbError::Tx(e.to_string()))?;
        Ok(removed == 0)
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        let (present,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM kv_set_members WHERE set_key = $1 AND member = $2)",
        )
        .bind(key)
        .bind(member)
        .fetch_one(&self.pool)
        .await?;
        Ok(present)
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT member FROM kv_set_members WHERE set_key = $1 ORDER BY member")
                .bind(key)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(m,)| m).collect())
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn check_health(&self) -> HealthStatus {
        self.pool.check_health().await
    }
}
