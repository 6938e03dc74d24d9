use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::future::try_join3;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::utils::validation::dedup_emails;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GroupMemberEmail {
    pub email: String,
}

/// 群组所有者，未注册的邮箱没有名称和头像
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupOwnerProfile {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupWithMembers {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<GroupMemberEmail>,
}

#[derive(Debug, Serialize)]
pub struct GroupDetails {
    pub group: Group,
    pub owners: Vec<GroupOwnerProfile>,
    pub members: Vec<GroupMemberEmail>,
}

#[derive(Debug, Serialize)]
pub struct GroupDetailsView {
    #[serde(flatten)]
    pub details: GroupDetails,
    pub is_owner: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub member_emails: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner_emails: Vec<String>,
    #[serde(default)]
    pub member_emails: Vec<String>,
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    group_id: Uuid,
    user_email: String,
}

/// 成员集合 = 所有者 ∪ 成员，所有者排在前面
pub fn group_member_set(owner_emails: &[String], member_emails: &[String]) -> Vec<String> {
    dedup_emails(owner_emails.iter().chain(member_emails).cloned())
}

impl GroupDetails {
    pub fn has_member(&self, email: &str) -> bool {
        self.members.iter().any(|m| m.email == email)
    }

    pub fn has_owner(&self, email: &str) -> bool {
        self.owners.iter().any(|o| o.email == email)
    }
}

impl Group {
    async fn insert_memberships(
        conn: &mut PgConnection,
        group_id: Uuid,
        owner_emails: &[String],
        member_emails: &[String],
    ) -> Result<(), sqlx::Error> {
        let owners = dedup_emails(owner_emails.iter().cloned());
        if !owners.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO group_owners (group_id, user_email)
                SELECT $1, UNNEST($2::TEXT[])
                "#,
            )
            .bind(group_id)
            .bind(&owners)
            .execute(&mut *conn)
            .await?;
        }

        let members = group_member_set(owner_emails, member_emails);
        if !members.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO group_members (group_id, user_email)
                SELECT $1, UNNEST($2::TEXT[])
                "#,
            )
            .bind(group_id)
            .bind(&members)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    pub async fn create(
        pool: &PgPool,
        name: &str,
        owner_emails: &[String],
        member_emails: &[String],
    ) -> Result<Uuid, sqlx::Error> {
        let group_id = Uuid::new_v4();

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO groups (id, name, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            "#,
        )
        .bind(group_id)
        .bind(name)
        .execute(&mut *tx)
        .await?;

        Self::insert_memberships(&mut tx, group_id, owner_emails, member_emails).await?;

        tx.commit().await?;

        tracing::debug!("Created group {} with {} owners", group_id, owner_emails.len());
        Ok(group_id)
    }

    /// 整体替换群组名称、所有者和成员。任何一步失败都会回滚，保留原状态。
    pub async fn update(
        pool: &PgPool,
        group_id: Uuid,
        name: &str,
        owner_emails: &[String],
        member_emails: &[String],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("UPDATE groups SET name = $2, updated_at = NOW() WHERE id = $1")
            .bind(group_id)
            .bind(name)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM group_owners WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM group_members WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        Self::insert_memberships(&mut tx, group_id, owner_emails, member_emails).await?;

        tx.commit().await?;

        Ok(())
    }

    /// 删除群组，所有者和成员记录级联删除。调用方负责权限校验。
    pub async fn delete(pool: &PgPool, group_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(group_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn is_owner(pool: &PgPool, user_email: &str, group_id: Uuid) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM group_owners
                WHERE group_id = $1 AND user_email = $2
            )
            "#,
        )
        .bind(group_id)
        .bind(user_email)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    async fn find_members_of(
        pool: &PgPool,
        group_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<GroupMemberEmail>>, sqlx::Error> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT group_id, user_email
            FROM group_members
            WHERE group_id = ANY($1)
            ORDER BY created_at, user_email
            "#,
        )
        .bind(group_ids)
        .fetch_all(pool)
        .await?;

        let mut members: HashMap<Uuid, Vec<GroupMemberEmail>> = HashMap::new();
        for row in rows {
            members
                .entry(row.group_id)
                .or_default()
                .push(GroupMemberEmail { email: row.user_email });
        }
        Ok(members)
    }

    async fn attach_members(
        pool: &PgPool,
        groups: Vec<Group>,
    ) -> Result<Vec<GroupWithMembers>, sqlx::Error> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = groups.iter().map(|g| g.id).collect();
        let mut members = Self::find_members_of(pool, &ids).await?;

        Ok(groups
            .into_iter()
            .map(|group| GroupWithMembers {
                members: members.remove(&group.id).unwrap_or_default(),
                group,
            })
            .collect())
    }

    /// 用户拥有或参与的所有群组（按 ID 去重），附带完整成员列表
    pub async fn find_all_for_user(
        pool: &PgPool,
        user_email: &str,
    ) -> Result<Vec<GroupWithMembers>, sqlx::Error> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name, created_at, updated_at
            FROM groups
            WHERE id IN (
                SELECT group_id FROM group_owners WHERE user_email = $1
                UNION
                SELECT group_id FROM group_members WHERE user_email = $1
            )
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_email)
        .fetch_all(pool)
        .await?;

        Self::attach_members(pool, groups).await
    }

    /// 分享俱乐部时可选的群组：用户所在的群组
    pub async fn find_for_sharing(
        pool: &PgPool,
        user_email: &str,
    ) -> Result<Vec<GroupWithMembers>, sqlx::Error> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name, g.created_at, g.updated_at
            FROM groups g
            JOIN group_members m ON m.group_id = g.id
            WHERE m.user_email = $1
            ORDER BY g.name
            "#,
        )
        .bind(user_email)
        .fetch_all(pool)
        .await?;

        Self::attach_members(pool, groups).await
    }

    /// 展开群组成员邮箱。只展开用户所在的群组，其它 ID 被忽略。
    pub async fn member_emails_for_sharing(
        pool: &PgPool,
        user_email: &str,
        group_ids: &[Uuid],
    ) -> Result<Vec<String>, sqlx::Error> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let emails = sqlx::query_scalar::<_, String>(
            r#"
            SELECT gm.user_email
            FROM group_members gm
            WHERE gm.group_id = ANY($1)
              AND EXISTS (
                SELECT 1 FROM group_members me
                WHERE me.group_id = gm.group_id AND me.user_email = $2
              )
            ORDER BY gm.created_at, gm.user_email
            "#,
        )
        .bind(group_ids)
        .bind(user_email)
        .fetch_all(pool)
        .await?;

        Ok(dedup_emails(emails))
    }

    pub async fn find_details(pool: &PgPool, group_id: Uuid) -> Result<Option<GroupDetails>, sqlx::Error> {
        let group_query = sqlx::query_as::<_, Group>(
            "SELECT id, name, created_at, updated_at FROM groups WHERE id = $1",
        )
        .bind(group_id)
        .fetch_optional(pool);

        let owners_query = sqlx::query_as::<_, GroupOwnerProfile>(
            r#"
            SELECT o.user_email AS email, u.name, u.image
            FROM group_owners o
            LEFT JOIN users u ON u.email = o.user_email
            WHERE o.group_id = $1
            ORDER BY o.created_at, o.user_email
            "#,
        )
        .bind(group_id)
        .fetch_all(pool);

        let members_query = sqlx::query_as::<_, GroupMemberEmail>(
            r#"
            SELECT user_email AS email
            FROM group_members
            WHERE group_id = $1
            ORDER BY created_at, user_email
            "#,
        )
        .bind(group_id)
        .fetch_all(pool);

        let (group, owners, members) = try_join3(group_query, owners_query, members_query).await?;

        Ok(group.map(|group| GroupDetails {
            group,
            owners,
            members,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_are_always_members() {
        let members = group_member_set(&["a@x.com".into()], &["b@x.com".into(), "a@x.com".into()]);
        assert_eq!(members, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn member_set_with_no_explicit_members_is_owner_set() {
        let owners = vec!["a@x.com".to_string(), "c@x.com".to_string()];
        assert_eq!(group_member_set(&owners, &[]), owners);
    }

    #[test]
    fn details_membership_checks() {
        let now = Utc::now();
        let details = GroupDetails {
            group: Group {
                id: Uuid::new_v4(),
                name: "Team".into(),
                created_at: now,
                updated_at: now,
            },
            owners: vec![GroupOwnerProfile {
                email: "a@x.com".into(),
                name: None,
                image: None,
            }],
            members: vec![
                GroupMemberEmail { email: "a@x.com".into() },
                GroupMemberEmail { email: "b@x.com".into() },
            ],
        };
        assert!(details.has_owner("a@x.com"));
        assert!(!details.has_owner("b@x.com"));
        assert!(details.has_member("b@x.com"));
        assert!(!details.has_member("z@x.com"));
    }

    #[test]
    fn group_with_members_flattens_group_fields() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let value = serde_json::to_value(GroupWithMembers {
            group: Group {
                id,
                name: "Team".into(),
                created_at: now,
                updated_at: now,
            },
            members: vec![GroupMemberEmail { email: "a@x.com".into() }],
        })
        .unwrap();
        assert_eq!(value["id"], serde_json::json!(id));
        assert_eq!(value["name"], "Team");
        assert_eq!(value["members"][0]["email"], "a@x.com");
    }
}
