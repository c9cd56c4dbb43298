//! 业务服务层 / Service layer

pub mod outcome;
pub mod pagination;
pub mod session;
pub mod user_service;

use std::sync::Arc;

use crate::repo::{
    KvStore, MemoryStore, ParticipationRepository, PgStore, RoleRepository, UserRepository,
};
use crate::HealthCheck;

pub use outcome::{Flash, Outcome, Reply, View};
pub use session::{Action, Session};
pub use user_service::{ServiceSettings, UserService};

/// 服务依赖的全部存储 / Every store the service depends on
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub participation: Arc<dyn ParticipationRepository>,
    pub kv: Arc<dyn KvStore>,
    pub health: Arc<dyn HealthCheck>,
}

impl Stores {
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            roles: store.clone(),
            participation: store.clone(),
            kv: store.clone(),
            health: store,
        }
    }

    pub fn postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            roles: store.clone(),
            participation: store.clone(),
            kv: store.clone(),
            health: store,
        }
    }
}
