use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use futures_util::future::try_join;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::utils::validation::dedup_emails;

/// 俱乐部详情：任意键值对（账号、电话、会员号等）
pub type ClubDetails = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub details: ClubDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 列表页使用的俱乐部信息，带所有者邮箱
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClubSummary {
    pub id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub details: ClubDetails,
    pub owner_email: String,
}

#[derive(Debug, Serialize)]
pub struct ClubWithOwnership {
    pub club: Club,
    pub owner_email: String,
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedWithItem {
    pub email: String,
    pub name: String,
    pub image: Option<String>,
    pub is_shared: bool,
}

#[derive(Debug, Serialize)]
pub struct ClubEditData {
    pub club: Club,
    pub shared_with: Vec<SharedWithItem>,
}

/// 调用者的联系人，附带对应账号的名称和头像
#[derive(Debug, Clone, FromRow)]
pub struct ContactCandidate {
    pub email: String,
    pub contact_name: Option<String>,
    pub user_name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClubRequest {
    #[serde(default)]
    pub name: String,
    pub details: Option<String>,
    #[serde(default)]
    pub member_emails: Vec<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
}

pub type UpdateClubRequest = CreateClubRequest;

/// 成员集合：去重，并去掉所有者自己
pub fn club_member_set(owner_email: &str, member_emails: &[String]) -> Vec<String> {
    dedup_emails(member_emails.iter().cloned())
        .into_iter()
        .filter(|email| email != owner_email)
        .collect()
}

/// 合并可见俱乐部列表，按俱乐部 ID 去重，保留先出现的一条
pub fn merge_visible_clubs(member: Vec<ClubSummary>, owned: Vec<ClubSummary>) -> Vec<ClubSummary> {
    let mut seen = HashSet::new();
    member
        .into_iter()
        .chain(owned)
        .filter(|club| seen.insert(club.id))
        .collect()
}

/// 编辑分享对象：联系人在前，随后是没有联系人记录的现有成员
pub fn build_shared_with(
    contacts: Vec<ContactCandidate>,
    member_emails: Vec<String>,
) -> Vec<SharedWithItem> {
    let members: HashSet<&str> = member_emails.iter().map(String::as_str).collect();
    let mut listed = HashSet::new();
    let mut items = Vec::with_capacity(contacts.len() + member_emails.len());

    for contact in contacts {
        if !listed.insert(contact.email.clone()) {
            continue;
        }
        let name = [contact.contact_name, contact.user_name]
            .into_iter()
            .flatten()
            .find(|name| !name.trim().is_empty())
            .unwrap_or_else(|| contact.email.clone());
        items.push(SharedWithItem {
            is_shared: members.contains(contact.email.as_str()),
            email: contact.email,
            name,
            image: contact.image,
        });
    }

    for email in &member_emails {
        if listed.insert(email.clone()) {
            items.push(SharedWithItem {
                email: email.clone(),
                name: email.clone(),
                image: None,
                is_shared: true,
            });
        }
    }

    items
}

impl Club {
    async fn insert(
        conn: &mut PgConnection,
        name: &str,
        owner_email: &str,
        member_emails: &[String],
        details: &ClubDetails,
    ) -> Result<Self, sqlx::Error> {
        let club_id = Uuid::new_v4();

        let club = sqlx::query_as::<_, Club>(
            r#"
            INSERT INTO clubs (id, name, details, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, name, details, created_at, updated_at
            "#,
        )
        .bind(club_id)
        .bind(name)
        .bind(Json(details))
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("INSERT INTO club_owners (club_id, user_email) VALUES ($1, $2)")
            .bind(club_id)
            .bind(owner_email)
            .execute(&mut *conn)
            .await?;

        let members = club_member_set(owner_email, member_emails);
        if !members.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO club_members (club_id, user_email)
                SELECT $1, UNNEST($2::TEXT[])
                "#,
            )
            .bind(club_id)
            .bind(&members)
            .execute(&mut *conn)
            .await?;
        }

        Ok(club)
    }

    /// 删除俱乐部，仅当 `user_email` 是所有者时生效。返回是否删除了记录。
    async fn delete_owned(
        conn: &mut PgConnection,
        club_id: Uuid,
        user_email: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM clubs c
            WHERE c.id = $1
              AND EXISTS (
                SELECT 1 FROM club_owners o
                WHERE o.club_id = c.id AND o.user_email = $2
              )
            "#,
        )
        .bind(club_id)
        .bind(user_email)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn create(
        pool: &PgPool,
        name: &str,
        owner_email: &str,
        member_emails: &[String],
        details: &ClubDetails,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let club = Self::insert(&mut tx, name, owner_email, member_emails, details).await?;
        tx.commit().await?;

        tracing::debug!("Created club {} owned by {}", club.id, owner_email);
        Ok(club)
    }

    pub async fn delete(pool: &PgPool, club_id: Uuid, user_email: &str) -> AppResult<()> {
        let mut conn = pool.acquire().await?;
        if !Self::delete_owned(&mut conn, club_id, user_email).await? {
            return Err(AppError::Unauthorized(
                "You do not have permission to delete this club.".into(),
            ));
        }
        Ok(())
    }

    /// 编辑俱乐部：新建一条记录并删除旧记录，俱乐部 ID 会改变
    pub async fn recreate(
        pool: &PgPool,
        club_id: Uuid,
        user_email: &str,
        name: &str,
        member_emails: &[String],
        details: &ClubDetails,
    ) -> AppResult<Self> {
        let mut tx = pool.begin().await?;

        // 未提交的事务在 drop 时回滚
        if !Self::delete_owned(&mut tx, club_id, user_email).await? {
            return Err(AppError::Unauthorized(
                "You do not have permission to edit this club.".into(),
            ));
        }
        let club = Self::insert(&mut tx, name, user_email, member_emails, details).await?;

        tx.commit().await?;

        tracing::debug!("Club {} replaced by {}", club_id, club.id);
        Ok(club)
    }

    pub async fn is_owner(pool: &PgPool, user_email: &str, club_id: Uuid) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM club_owners
                WHERE club_id = $1 AND user_email = $2
            )
            "#,
        )
        .bind(club_id)
        .bind(user_email)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    pub async fn is_member(pool: &PgPool, user_email: &str, club_id: Uuid) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM club_members
                WHERE club_id = $1 AND user_email = $2
            )
            "#,
        )
        .bind(club_id)
        .bind(user_email)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    pub async fn find_owned(pool: &PgPool, user_email: &str) -> Result<Vec<ClubSummary>, sqlx::Error> {
        sqlx::query_as::<_, ClubSummary>(
            r#"
            SELECT c.id, c.name, c.details, o.user_email AS owner_email
            FROM club_owners o
            JOIN clubs c ON c.id = o.club_id
            WHERE o.user_email = $1
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(user_email)
        .fetch_all(pool)
        .await
    }

    async fn find_membered(pool: &PgPool, user_email: &str) -> Result<Vec<ClubSummary>, sqlx::Error> {
        sqlx::query_as::<_, ClubSummary>(
            r#"
            SELECT c.id, c.name, c.details, o.user_email AS owner_email
            FROM club_members m
            JOIN clubs c ON c.id = m.club_id
            JOIN club_owners o ON o.club_id = m.club_id
            WHERE m.user_email = $1
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(user_email)
        .fetch_all(pool)
        .await
    }

    /// 用户可见的所有俱乐部：作为成员的在前，其次是自己拥有的
    pub async fn find_all_member(pool: &PgPool, user_email: &str) -> Result<Vec<ClubSummary>, sqlx::Error> {
        let (member, owned) = try_join(
            Self::find_membered(pool, user_email),
            Self::find_owned(pool, user_email),
        )
        .await?;

        Ok(merge_visible_clubs(member, owned))
    }

    pub async fn find_by_id(pool: &PgPool, club_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Club>(
            r#"
            SELECT id, name, details, created_at, updated_at
            FROM clubs
            WHERE id = $1
            "#,
        )
        .bind(club_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_details(
        pool: &PgPool,
        club_id: Uuid,
        user_email: &str,
    ) -> Result<Option<ClubWithOwnership>, sqlx::Error> {
        let Some(club) = Self::find_by_id(pool, club_id).await? else {
            return Ok(None);
        };

        let owner_email: Option<String> = sqlx::query_scalar(
            "SELECT user_email FROM club_owners WHERE club_id = $1 LIMIT 1",
        )
        .bind(club_id)
        .fetch_optional(pool)
        .await?;

        // 每个俱乐部都有所有者；没有所有者的记录不对外展示
        Ok(owner_email.map(|owner_email| ClubWithOwnership {
            is_owner: owner_email == user_email,
            owner_email,
            club,
        }))
    }

    pub async fn find_edit_data(
        pool: &PgPool,
        club_id: Uuid,
        user_email: &str,
    ) -> Result<Option<ClubEditData>, sqlx::Error> {
        let Some(club) = Self::find_by_id(pool, club_id).await? else {
            return Ok(None);
        };

        let members_query = sqlx::query_scalar::<_, String>(
            r#"
            SELECT user_email
            FROM club_members
            WHERE club_id = $1 AND user_email <> $2
            ORDER BY created_at, user_email
            "#,
        )
        .bind(club_id)
        .bind(user_email)
        .fetch_all(pool);

        let contacts_query = sqlx::query_as::<_, ContactCandidate>(
            r#"
            SELECT
                ct.contact_email AS email,
                ct.display_name AS contact_name,
                u.name AS user_name,
                u.image
            FROM contacts ct
            LEFT JOIN users u ON u.email = ct.contact_email
            WHERE ct.user_email = $1
            ORDER BY ct.created_at, ct.contact_email
            "#,
        )
        .bind(user_email)
        .fetch_all(pool);

        let (member_emails, contacts) = try_join(members_query, contacts_query).await?;

        Ok(Some(ClubEditData {
            club,
            shared_with: build_shared_with(contacts, member_emails),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: Uuid, owner: &str) -> ClubSummary {
        ClubSummary {
            id,
            name: "Gym".into(),
            details: ClubDetails::new(),
            owner_email: owner.into(),
        }
    }

    fn contact(email: &str, contact_name: Option<&str>, user_name: Option<&str>) -> ContactCandidate {
        ContactCandidate {
            email: email.into(),
            contact_name: contact_name.map(Into::into),
            user_name: user_name.map(Into::into),
            image: None,
        }
    }

    #[test]
    fn owner_never_lands_in_member_set() {
        let members = club_member_set(
            "a@x.com",
            &["b@x.com".into(), "a@x.com".into(), "b@x.com".into(), "c@x.com".into()],
        );
        assert_eq!(members, vec!["b@x.com", "c@x.com"]);
    }

    #[test]
    fn visible_clubs_are_deduplicated_by_id() {
        let shared = Uuid::new_v4();
        let owned_only = Uuid::new_v4();
        let merged = merge_visible_clubs(
            vec![summary(shared, "a@x.com")],
            vec![summary(shared, "a@x.com"), summary(owned_only, "a@x.com")],
        );
        let ids: Vec<Uuid> = merged.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![shared, owned_only]);
    }

    #[test]
    fn shared_flag_tracks_current_members_only() {
        let items = build_shared_with(
            vec![
                contact("b@x.com", Some("Bob"), None),
                contact("c@x.com", None, Some("Carol Account")),
            ],
            vec!["b@x.com".into()],
        );
        assert_eq!(items.len(), 2);
        assert!(items[0].is_shared);
        assert_eq!(items[0].name, "Bob");
        assert!(!items[1].is_shared);
        assert_eq!(items[1].name, "Carol Account");
    }

    #[test]
    fn members_without_contact_fall_back_to_raw_email() {
        let items = build_shared_with(
            vec![contact("b@x.com", None, None)],
            vec!["d@x.com".into(), "b@x.com".into()],
        );
        assert_eq!(
            items,
            vec![
                SharedWithItem {
                    email: "b@x.com".into(),
                    name: "b@x.com".into(),
                    image: None,
                    is_shared: true,
                },
                SharedWithItem {
                    email: "d@x.com".into(),
                    name: "d@x.com".into(),
                    image: None,
                    is_shared: true,
                },
            ]
        );
    }

    #[test]
    fn blank_contact_name_is_skipped_for_account_name() {
        let items = build_shared_with(vec![contact("e@x.com", Some(""), Some("Eve"))], vec![]);
        assert_eq!(items[0].name, "Eve");
    }
}
