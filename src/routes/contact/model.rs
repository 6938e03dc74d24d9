use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub user_email: String,
    pub contact_email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 分享选择器使用的联系人，带对应账号的头像
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContactForSharing {
    pub contact_email: String,
    pub display_name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    pub display_name: Option<String>,
}

/// 由名和姓拼出显示名称
pub fn display_name_from(first_name: &str, last_name: Option<&str>) -> String {
    format!("{} {}", first_name.trim(), last_name.unwrap_or_default().trim())
        .trim()
        .to_string()
}

impl Contact {
    pub async fn create(
        pool: &PgPool,
        user_email: &str,
        contact_email: &str,
        display_name: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (user_email, contact_email, display_name, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING user_email, contact_email, display_name, created_at
            "#,
        )
        .bind(user_email)
        .bind(contact_email)
        .bind(display_name)
        .fetch_one(pool)
        .await
    }

    /// 返回是否删除了记录
    pub async fn delete(pool: &PgPool, user_email: &str, contact_email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM contacts WHERE user_email = $1 AND contact_email = $2")
            .bind(user_email)
            .bind(contact_email)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 只修改显示名称，返回是否找到了联系人
    pub async fn update_display_name(
        pool: &PgPool,
        user_email: &str,
        contact_email: &str,
        display_name: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET display_name = $3
            WHERE user_email = $1 AND contact_email = $2
            "#,
        )
        .bind(user_email)
        .bind(contact_email)
        .bind(display_name)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_all(pool: &PgPool, user_email: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT user_email, contact_email, display_name, created_at
            FROM contacts
            WHERE user_email = $1
            ORDER BY created_at, contact_email
            "#,
        )
        .bind(user_email)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_email(
        pool: &PgPool,
        user_email: &str,
        contact_email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT user_email, contact_email, display_name, created_at
            FROM contacts
            WHERE user_email = $1 AND contact_email = $2
            "#,
        )
        .bind(user_email)
        .bind(contact_email)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_for_sharing(pool: &PgPool, user_email: &str) -> Result<Vec<ContactForSharing>, sqlx::Error> {
        sqlx::query_as::<_, ContactForSharing>(
            r#"
            SELECT ct.contact_email, ct.display_name, u.image
            FROM contacts ct
            LEFT JOIN users u ON u.email = ct.contact_email
            WHERE ct.user_email = $1
            ORDER BY ct.created_at, ct.contact_email
            "#,
        )
        .bind(user_email)
        .fetch_all(pool)
        .await
    }
}
