use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HEARTS: i32 = 5;
pub const DEFAULT_ACTIVE_LEVEL: i32 = 1;

/// A user profile ("Yapper")
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct Yapper {
    #[graphql(name = "_id")]
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[graphql(skip)]
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub skills: Vec<String>,
    pub active_level: i32,
    pub completed_levels: i32,
    pub hearts: i32,
    pub streak: i32,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[graphql(skip)]
    pub follower_ids: Vec<String>,
    #[graphql(skip)]
    pub following_ids: Vec<String>,
}

impl Yapper {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            skills: Vec::new(),
            active_level: DEFAULT_ACTIVE_LEVEL,
            completed_levels: 0,
            hearts: DEFAULT_HEARTS,
            streak: 0,
            avatar: None,
            created_at: now,
            updated_at: now,
            follower_ids: Vec::new(),
            following_ids: Vec::new(),
        }
    }
}

/// Input for `addYapper`
#[derive(Debug, Clone, InputObject)]
pub struct NewYapperInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl NewYapperInput {
    /// Trim and check required fields before anything is hashed or stored
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".into());
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err("email is required".into());
        }
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err("email must be a valid email address".into());
        }
        if self.password.len() < 5 {
            return Err("password must be at least 5 characters".into());
        }
        Ok(())
    }
}

/// Partial progress update, `None` keeps the stored value
#[derive(Debug, Clone, Default, InputObject)]
pub struct ProgressInput {
    pub active_level: Option<i32>,
    pub completed_levels: Option<i32>,
    pub hearts: Option<i32>,
    pub streak: Option<i32>,
}

impl ProgressInput {
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("activeLevel", self.active_level),
            ("completedLevels", self.completed_levels),
            ("hearts", self.hearts),
            ("streak", self.streak),
        ];
        for (name, value) in fields {
            if matches!(value, Some(v) if v < 0) {
                return Err(format!("{name} cannot be negative"));
            }
        }
        Ok(())
    }
}

/// Returned by `addYapper` and `login`
#[derive(Debug, Clone, SimpleObject)]
pub struct Auth {
    pub token: String,
    pub yapper: Yapper,
}
