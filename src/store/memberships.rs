//! # 团队成员存储操作

use chrono::Utc;
use entity::team_memberships::{self, MembershipRole};
use entity::{TeamMemberships, Users};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use super::{map_unique_violation, Store};
use crate::error::{MaasError, Result};

impl Store {
    /// 添加成员；(团队, 用户) 重复时返回冲突
    pub async fn add_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: MembershipRole,
    ) -> Result<team_memberships::Model> {
        // 先确认用户存在，把外键错误变成明确的404
        if self.get_user(user_id).await?.is_none() {
            return Err(MaasError::not_found("User", user_id.to_string()));
        }

        let membership = team_memberships::ActiveModel {
            team_id: Set(team_id),
            user_id: Set(user_id),
            role: Set(role),
            joined_at: Set(Utc::now()),
        };

        membership
            .insert(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, "Membership", &user_id.to_string()))
    }

    /// 成员列表，连带用户信息
    pub async fn list_members(
        &self,
        team_id: Uuid,
    ) -> Result<Vec<(team_memberships::Model, Option<entity::users::Model>)>> {
        Ok(TeamMemberships::find()
            .filter(team_memberships::Column::TeamId.eq(team_id))
            .find_also_related(Users)
            .all(&self.db)
            .await?)
    }

    pub async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> Result<()> {
        let result = TeamMemberships::delete_by_id((team_id, user_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(MaasError::not_found("Membership", user_id.to_string()));
        }
        Ok(())
    }

    pub async fn is_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool> {
        let count = TeamMemberships::find()
            .filter(team_memberships::Column::TeamId.eq(team_id))
            .filter(team_memberships::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    /// 用户的全部团队成员关系
    pub async fn list_user_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<team_memberships::Model>> {
        Ok(TeamMemberships::find()
            .filter(team_memberships::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?)
    }

    /// 查找成员关系（内省时带出角色）
    pub async fn find_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<team_memberships::Model>> {
        Ok(TeamMemberships::find_by_id((team_id, user_id))
            .one(&self.db)
            .await?)
    }
}
