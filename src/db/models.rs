use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Counselor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Counselor => "counselor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "counselor" => Ok(Role::Counselor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Stored identity record. Never serialized directly; responses go through
/// [`PrincipalSummary`] or [`ProfileView`] so the hash cannot leak.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(
        email: String,
        password_hash: String,
        role: Role,
        first_name: String,
        last_name: String,
        phone: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            role,
            first_name,
            last_name,
            phone,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub struct PrincipalRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = String;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        Ok(Principal {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            active: row.is_active,
            created_at: row.created_at,
        })
    }
}

/// Redacted principal returned by register and login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalSummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub grade_level: Option<String>,
    pub interests: Option<String>,
    pub career_goals: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CounselorProfile {
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
    pub experience_years: Option<i32>,
    pub bio: Option<String>,
    pub is_verified: bool,
}

/// Role-specific subsidiary record. Admins have none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoleProfile {
    Student(StudentProfile),
    Counselor(CounselorProfile),
}

impl RoleProfile {
    /// Empty profile created alongside a new principal.
    pub fn empty_for(role: Role) -> Option<Self> {
        match role {
            Role::Student => Some(RoleProfile::Student(StudentProfile::default())),
            Role::Counselor => Some(RoleProfile::Counselor(CounselorProfile::default())),
            Role::Admin => None,
        }
    }
}

/// Full read-only projection served by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub role_profile: Option<RoleProfile>,
}

/// Admin listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalListing {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Principal> for PrincipalListing {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id,
            email: p.email.clone(),
            role: p.role,
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            phone: p.phone.clone(),
            is_active: p.active,
            created_at: p.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(role: Role) -> Principal {
        Principal::new(
            "a@x.com".into(),
            "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".into(),
            role,
            "Ada".into(),
            "Lovelace".into(),
            None,
        )
    }

    #[test]
    fn test_role_round_trips_through_text() {
        for role in [Role::Student, Role::Counselor, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_summary_never_carries_hash() {
        let principal = sample(Role::Student);
        let json = serde_json::to_value(principal.summary()).unwrap();

        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["role"], "student");
        assert_eq!(json["firstName"], "Ada");
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }

    #[test]
    fn test_profile_view_flattens_role_fields() {
        let principal = sample(Role::Counselor);
        let view = ProfileView {
            id: principal.id,
            email: principal.email.clone(),
            role: principal.role,
            first_name: principal.first_name.clone(),
            last_name: principal.last_name.clone(),
            phone: None,
            created_at: principal.created_at,
            role_profile: Some(RoleProfile::Counselor(CounselorProfile {
                specialization: Some("STEM".into()),
                ..Default::default()
            })),
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["specialization"], "STEM");
        assert_eq!(json["isVerified"], false);
        assert!(json.get("is_verified").is_none());
        assert_eq!(json["role"], "counselor");
    }

    #[test]
    fn test_admin_has_no_role_profile() {
        assert!(RoleProfile::empty_for(Role::Admin).is_none());
        assert!(matches!(
            RoleProfile::empty_for(Role::Student),
            Some(RoleProfile::Student(_))
        ));
    }
}
