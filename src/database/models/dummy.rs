use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::repository::Entity;

/// Sample resource served by the `/dummy` endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dummy {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub field: String,
}

impl Dummy {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            id: None,
            field: field.into(),
        }
    }
}

impl Entity for Dummy {
    const TABLE: &'static str = "dummy";
    const COLUMNS: &'static [&'static str] = &["id", "field"];

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }
}
