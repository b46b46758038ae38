use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::error;
use uuid::Uuid;

use crate::models::*;

/// Outcome of the transactional bulk-accept write. `CapacityExhausted`
/// means the guarded counter update matched zero rows: either a raced
/// second submit used up the slots or the generation vanished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkWriteOutcome {
    Accepted,
    CapacityExhausted,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS generations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                model TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                generated_count INTEGER NOT NULL,
                accepted_unedited_count INTEGER NOT NULL DEFAULT 0,
                accepted_edited_count INTEGER NOT NULL DEFAULT 0,
                source_text_hash TEXT NOT NULL,
                source_text_length INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS generation_error_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                model TEXT NOT NULL,
                source_text_hash TEXT NOT NULL,
                source_text_length INTEGER NOT NULL,
                error_code TEXT NOT NULL,
                error_message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flashcards (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                source TEXT NOT NULL,
                generation_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (generation_id) REFERENCES generations(id) ON DELETE SET NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Generation operations

    pub async fn insert_generation(&self, generation: &Generation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO generations (id, user_id, model, duration_ms, generated_count,
                                     accepted_unedited_count, accepted_edited_count,
                                     source_text_hash, source_text_length, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(generation.id.to_string())
        .bind(generation.user_id.to_string())
        .bind(&generation.model)
        .bind(generation.duration_ms)
        .bind(generation.generated_count)
        .bind(generation.accepted_unedited_count)
        .bind(generation.accepted_edited_count)
        .bind(&generation.source_text_hash)
        .bind(generation.source_text_length)
        .bind(generation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_generation(&self, id: Uuid, user_id: Uuid) -> Result<Option<Generation>> {
        let row = sqlx::query("SELECT * FROM generations WHERE id = ?1 AND user_id = ?2")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_generation(&row)).transpose()
    }

    /// Number of generations this user created at or after `since`.
    pub async fn count_generations_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM generations WHERE user_id = ?1 AND created_at >= ?2",
        )
        .bind(user_id.to_string())
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("n"))
    }

    pub async fn insert_generation_error(&self, log: &GenerationErrorLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO generation_error_logs (id, user_id, model, source_text_hash,
                                               source_text_length, error_code,
                                               error_message, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(log.id.to_string())
        .bind(log.user_id.to_string())
        .bind(&log.model)
        .bind(&log.source_text_hash)
        .bind(log.source_text_length)
        .bind(&log.error_code)
        .bind(&log.error_message)
        .bind(log.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Applies one accepted batch: bumps the generation's acceptance
    /// counters and inserts the flashcards in a single transaction.
    ///
    /// The counter update is guarded by the capacity invariant, so a
    /// concurrent submit that raced past the service-level check matches
    /// zero rows here and the whole batch is abandoned instead of
    /// overshooting `generated_count`.
    pub async fn bulk_accept_flashcards(
        &self,
        user_id: Uuid,
        generation_id: Uuid,
        flashcards: &[Flashcard],
        unedited_count: i32,
        edited_count: i32,
    ) -> Result<BulkWriteOutcome> {
        let requested = unedited_count + edited_count;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE generations
            SET accepted_unedited_count = accepted_unedited_count + ?1,
                accepted_edited_count = accepted_edited_count + ?2
            WHERE id = ?3 AND user_id = ?4
              AND accepted_unedited_count + accepted_edited_count + ?5 <= generated_count
            "#,
        )
        .bind(unedited_count)
        .bind(edited_count)
        .bind(generation_id.to_string())
        .bind(user_id.to_string())
        .bind(requested)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(BulkWriteOutcome::CapacityExhausted);
        }

        for card in flashcards {
            let inserted = sqlx::query(
                r#"
                INSERT INTO flashcards (id, user_id, front, back, source,
                                        generation_id, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(card.id.to_string())
            .bind(card.user_id.to_string())
            .bind(&card.front)
            .bind(&card.back)
            .bind(card.source.as_str())
            .bind(card.generation_id.map(|id| id.to_string()))
            .bind(card.created_at.to_rfc3339())
            .bind(card.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                // The counters were already bumped inside this transaction;
                // rolling back keeps them consistent with the missing cards.
                error!(
                    generation_id = %generation_id,
                    user_id = %user_id,
                    flashcard_id = %card.id,
                    error = %e,
                    "CRITICAL: bulk accept insert failed after counter update, rolling back batch"
                );
                tx.rollback().await?;
                return Err(anyhow!("bulk accept insert failed: {e}"));
            }
        }

        tx.commit().await?;
        Ok(BulkWriteOutcome::Accepted)
    }

    // Flashcard operations

    pub async fn insert_flashcard(&self, card: &Flashcard) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO flashcards (id, user_id, front, back, source,
                                    generation_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(card.id.to_string())
        .bind(card.user_id.to_string())
        .bind(&card.front)
        .bind(&card.back)
        .bind(card.source.as_str())
        .bind(card.generation_id.map(|id| id.to_string()))
        .bind(card.created_at.to_rfc3339())
        .bind(card.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_flashcard(&self, id: Uuid, user_id: Uuid) -> Result<Option<Flashcard>> {
        let row = sqlx::query("SELECT * FROM flashcards WHERE id = ?1 AND user_id = ?2")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_flashcard(&row)).transpose()
    }

    pub async fn list_flashcards(
        &self,
        user_id: Uuid,
        source: Option<FlashcardSource>,
    ) -> Result<Vec<Flashcard>> {
        let rows = match source {
            Some(source) => {
                sqlx::query(
                    "SELECT * FROM flashcards WHERE user_id = ?1 AND source = ?2 \
                     ORDER BY created_at DESC",
                )
                .bind(user_id.to_string())
                .bind(source.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM flashcards WHERE user_id = ?1 ORDER BY created_at DESC")
                    .bind(user_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_to_flashcard).collect()
    }

    pub async fn count_flashcards(&self, user_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM flashcards WHERE user_id = ?1")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("n"))
    }

    pub async fn update_flashcard(&self, card: &Flashcard) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE flashcards
            SET front = ?1, back = ?2, source = ?3, updated_at = ?4
            WHERE id = ?5 AND user_id = ?6
            "#,
        )
        .bind(&card.front)
        .bind(&card.back)
        .bind(card.source.as_str())
        .bind(card.updated_at.to_rfc3339())
        .bind(card.id.to_string())
        .bind(card.user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_flashcard(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM flashcards WHERE id = ?1 AND user_id = ?2")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_generation(row: &sqlx::sqlite::SqliteRow) -> Result<Generation> {
    Ok(Generation {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        user_id: Uuid::parse_str(&row.get::<String, _>("user_id"))?,
        model: row.get("model"),
        duration_ms: row.get("duration_ms"),
        generated_count: row.get("generated_count"),
        accepted_unedited_count: row.get("accepted_unedited_count"),
        accepted_edited_count: row.get("accepted_edited_count"),
        source_text_hash: row.get("source_text_hash"),
        source_text_length: row.get("source_text_length"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_flashcard(row: &sqlx::sqlite::SqliteRow) -> Result<Flashcard> {
    let source_str: String = row.get("source");
    let source = FlashcardSource::parse(&source_str)
        .ok_or_else(|| anyhow!("unknown flashcard source '{source_str}' in database"))?;

    Ok(Flashcard {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        user_id: Uuid::parse_str(&row.get::<String, _>("user_id"))?,
        front: row.get("front"),
        back: row.get("back"),
        source,
        generation_id: row
            .get::<Option<String>, _>("generation_id")
            .and_then(|s| Uuid::parse_str(&s).ok()),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}
