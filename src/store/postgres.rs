//! PostgreSQL implementation of the tally store.
//!
//! Uniqueness of (user, poll) is enforced by the `votes_user_poll_unique`
//! constraint. A vote is a single `INSERT … SELECT … RETURNING` statement
//! that resolves the option's poll and inserts in one step, so no read
//! precedes the write and a cancelled request can never leave half a vote.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{StoreError, TallyStore};
use crate::config::GatewayConfig;
use crate::domain::{
    NewPoll, OptionId, OptionTally, Poll, PollId, PollOption, PollWithResults, UserId, VoteId,
};

type PollRow = (i64, String, bool, i64, DateTime<Utc>, DateTime<Utc>);

/// PostgreSQL-backed [`TallyStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresTallyStore {
    pool: PgPool,
}

impl PostgresTallyStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the database cannot be reached.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Applies pending schema migrations from `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

/// Maps errors raised before a statement reached the server to
/// [`StoreError::Unavailable`]; everything else is a backend failure.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

/// Maps a failed vote insert: the (user, poll) unique constraint means a
/// duplicate, a foreign-key failure means the option vanished between
/// resolution and insert.
fn map_vote_insert_error(err: sqlx::Error, option_id: OptionId) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateVote,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::OptionNotFound(option_id)
        }
        other => map_sqlx_error(other),
    }
}

fn poll_from_row(row: PollRow) -> Poll {
    let (id, question, is_published, creator_id, created_at, updated_at) = row;
    Poll {
        id: PollId::new(id),
        question,
        is_published,
        creator_id: UserId::new(creator_id),
        created_at,
        updated_at,
    }
}

#[async_trait]
impl TallyStore for PostgresTallyStore {
    async fn find_poll_option(
        &self,
        option_id: OptionId,
    ) -> Result<Option<PollOption>, StoreError> {
        let row = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT id, poll_id, text FROM poll_options WHERE id = $1",
        )
        .bind(option_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|(id, poll_id, text)| PollOption {
            id: OptionId::new(id),
            poll_id: PollId::new(poll_id),
            text,
        }))
    }

    async fn persist_vote(
        &self,
        user_id: UserId,
        option_id: OptionId,
    ) -> Result<VoteId, StoreError> {
        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO votes (user_id, poll_id, option_id) \
             SELECT $1, poll_id, id FROM poll_options WHERE id = $2 \
             RETURNING id",
        )
        .bind(user_id.get())
        .bind(option_id.get())
        .fetch_optional(&self.pool)
        .await;

        match inserted {
            Ok(Some(id)) => Ok(VoteId::new(id)),
            Ok(None) => Err(StoreError::OptionNotFound(option_id)),
            Err(e) => Err(map_vote_insert_error(e, option_id)),
        }
    }

    async fn list_options_with_counts(
        &self,
        poll_id: PollId,
    ) -> Result<Vec<OptionTally>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT o.id, o.text, COUNT(v.id) AS votes \
             FROM poll_options o LEFT JOIN votes v ON v.option_id = o.id \
             WHERE o.poll_id = $1 \
             GROUP BY o.id, o.text, o.position \
             ORDER BY o.position ASC, o.id ASC",
        )
        .bind(poll_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, text, votes)| OptionTally {
                id: OptionId::new(id),
                text,
                votes,
            })
            .collect())
    }

    async fn create_poll(&self, new_poll: NewPoll) -> Result<PollWithResults, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, PollRow>(
            "INSERT INTO polls (question, is_published, creator_id) VALUES ($1, $2, $3) \
             RETURNING id, question, is_published, creator_id, created_at, updated_at",
        )
        .bind(&new_poll.question)
        .bind(new_poll.is_published)
        .bind(new_poll.creator_id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let poll = poll_from_row(row);

        let mut options = Vec::with_capacity(new_poll.options.len());
        for (position, text) in new_poll.options.into_iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::Backend("too many options".to_string()))?;
            let id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO poll_options (poll_id, text, position) VALUES ($1, $2, $3) \
                 RETURNING id",
            )
            .bind(poll.id.get())
            .bind(&text)
            .bind(position)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            options.push(OptionTally {
                id: OptionId::new(id),
                text,
                votes: 0,
            });
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(PollWithResults { poll, options })
    }

    async fn get_poll(&self, poll_id: PollId) -> Result<Option<Poll>, StoreError> {
        let row = sqlx::query_as::<_, PollRow>(
            "SELECT id, question, is_published, creator_id, created_at, updated_at \
             FROM polls WHERE id = $1",
        )
        .bind(poll_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(poll_from_row))
    }

    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let rows = sqlx::query_as::<_, PollRow>(
            "SELECT id, question, is_published, creator_id, created_at, updated_at \
             FROM polls ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(poll_from_row).collect())
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
