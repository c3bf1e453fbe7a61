use std::sync::Arc;

use crate::auth::JwtWrapper;
use crate::config::{keys, ConfigResult, Container};
use crate::database::{Entity, SharedRepository};
use crate::services::UserService;

/// Router state: the container built at boot, passed explicitly to every handler
#[derive(Clone, Debug)]
pub struct AppState {
    container: Arc<Container>,
}

impl AppState {
    pub fn new(container: Arc<Container>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn jwt(&self) -> ConfigResult<Arc<JwtWrapper>> {
        self.container.get_as::<JwtWrapper>(keys::JWT_WRAPPER)
    }

    pub fn user_service(&self) -> ConfigResult<Arc<UserService>> {
        self.container.get_as::<UserService>(keys::USER_SERVICE)
    }

    pub fn repository<T: Entity>(&self, key: &str) -> ConfigResult<SharedRepository<T>> {
        self.container
            .get_as::<SharedRepository<T>>(key)
            .map(|repository| (*repository).clone())
    }
}
