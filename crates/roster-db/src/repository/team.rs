//! # Team Repository
//!
//! Teams are owned independently of members; a member only holds the
//! team's id. Queries here never touch the member cache.

use roster_core::validation::validate_team_name;
use roster_core::{CoreError, Team};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// Repository for team database operations.
#[derive(Debug, Clone)]
pub struct TeamRepository {
    pool: SqlitePool,
}

impl TeamRepository {
    /// Creates a new TeamRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TeamRepository { pool }
    }

    /// Inserts a team and returns it with its generated id.
    ///
    /// ## Errors
    /// * `CoreError::Validation` - blank or overlong name
    pub async fn save(&self, name: &str) -> DbResult<Team> {
        validate_team_name(name).map_err(CoreError::from)?;

        let result = sqlx::query("INSERT INTO team (name) VALUES (?1)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        let team = Team::restore(result.last_insert_rowid(), name)?;
        debug!(id = team.id, name = %team.name, "Team inserted");
        Ok(team)
    }

    /// Gets a team by ID.
    pub async fn find_by_id(&self, id: i64) -> DbResult<Option<Team>> {
        let team = sqlx::query_as::<_, Team>("SELECT team_id, name FROM team WHERE team_id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(team)
    }

    /// All teams, oldest first.
    pub async fn find_all(&self) -> DbResult<Vec<Team>> {
        let teams = sqlx::query_as::<_, Team>("SELECT team_id, name FROM team ORDER BY team_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(teams)
    }

    pub async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM team")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use roster_core::{CoreError, ValidationError, MAX_TEAM_NAME_LEN};

    #[tokio::test]
    async fn test_save_and_find() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let teams = db.teams();

        let a = teams.save("teamA").await.unwrap();
        let b = teams.save("teamB").await.unwrap();
        assert_ne!(a.id, b.id);

        let found = teams.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(found.name, "teamA");
        assert!(teams.find_by_id(999).await.unwrap().is_none());

        let all = teams.find_all().await.unwrap();
        assert_eq!(
            all.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            ["teamA", "teamB"]
        );
        assert_eq!(teams.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_blank_or_overlong_name_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(matches!(
            db.teams().save("  ").await,
            Err(DbError::Core(CoreError::Validation(_)))
        ));
        assert!(matches!(
            db.teams().save(&"t".repeat(MAX_TEAM_NAME_LEN + 1)).await,
            Err(DbError::Core(CoreError::Validation(ValidationError::TooLong { .. })))
        ));
        assert_eq!(db.teams().count().await.unwrap(), 0);
    }
}
