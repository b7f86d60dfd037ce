//! Organizations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::email::Email;
use crate::envelope::KeyMaterial;
use crate::types::ObjectId;

/// An organization record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: ObjectId,
    pub name: String,
    pub billing_email: Option<Email>,
    pub admin_email: Email,
    pub key_material: KeyMaterial,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
