//! The single admin identity.

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use crate::{config::AdminConfig, db::models::AdminUserRow};

#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub username: String,
    pub password_hash: String,
}

/// Where the admin identity is read from on each login attempt.
#[derive(Clone)]
pub enum AdminDirectory {
    /// Credentials from configuration, checked in-process.
    Static(AdminIdentity),
    /// A seeded `admin_users` row, created from configuration if absent.
    Database { pool: PgPool, seed: AdminIdentity },
}

impl AdminDirectory {
    pub fn from_config(config: &AdminConfig, pool: Option<PgPool>) -> Self {
        let seed = AdminIdentity {
            username: config.username.clone(),
            password_hash: config.password_hash.clone(),
        };
        match pool {
            Some(pool) => AdminDirectory::Database { pool, seed },
            None => AdminDirectory::Static(seed),
        }
    }

    /// Hash verified when the username does not match, so a wrong username
    /// costs the same bcrypt work as a wrong password.
    pub fn fallback_hash(&self) -> &str {
        match self {
            AdminDirectory::Static(identity) => &identity.password_hash,
            AdminDirectory::Database { seed, .. } => &seed.password_hash,
        }
    }

    pub async fn find(&self, username: &str) -> Result<Option<AdminIdentity>, AuthError> {
        match self {
            AdminDirectory::Static(identity) => {
                Ok(same_username(&identity.username, username).then(|| identity.clone()))
            }
            AdminDirectory::Database { pool, seed } => {
                sqlx::query(
                    r#"
                    INSERT INTO admin_users (id, username, password_hash, created_at)
                    VALUES ($1, $2, $3, now())
                    ON CONFLICT (username) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&seed.username)
                .bind(&seed.password_hash)
                .execute(pool)
                .await?;

                let row = sqlx::query_as::<_, AdminUserRow>(
                    "SELECT id, username, password_hash FROM admin_users WHERE username = $1",
                )
                .bind(username)
                .fetch_optional(pool)
                .await?;

                Ok(row.map(|row| AdminIdentity {
                    username: row.username,
                    password_hash: row.password_hash,
                }))
            }
        }
    }
}

/// Compare digests rather than the raw strings so the time taken does not
/// depend on how long a matching prefix is.
fn same_username(expected: &str, supplied: &str) -> bool {
    Sha256::digest(expected.as_bytes()) == Sha256::digest(supplied.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> AdminDirectory {
        AdminDirectory::from_config(
            &AdminConfig {
                username: "admin".into(),
                password_hash: "$2b$04$placeholder".into(),
            },
            None,
        )
    }

    #[tokio::test]
    async fn test_static_directory_matches_exact_username() {
        let directory = directory();
        assert!(directory.find("admin").await.unwrap().is_some());
        assert!(directory.find("Admin").await.unwrap().is_none());
        assert!(directory.find("admin ").await.unwrap().is_none());
    }

    #[test]
    fn test_fallback_hash_is_configured_hash() {
        assert_eq!(directory().fallback_hash(), "$2b$04$placeholder");
    }
}
