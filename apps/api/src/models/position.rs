use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The slice of a job position that feeds question generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct PositionProfile {
    pub id: Uuid,
    pub title: String,
    pub domain: Option<String>,
    pub min_experience: Option<i32>,
    pub max_experience: Option<i32>,
    pub mandatory_skills: Vec<String>,
    pub optional_skills: Vec<String>,
}

/// A candidate currently bound to a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CandidateRef {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}
