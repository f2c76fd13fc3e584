use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use cinebook_core::models::{
    Genre, Movie, MovieUpdate, NewMovie, NewShowtime, SeatAvailability, Showtime,
};
use cinebook_core::repository::{CatalogRepository, StoreError};

use crate::db_error;

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct GenreRow {
    genre_id: i32,
    name: String,
}

#[derive(sqlx::FromRow)]
struct MovieRow {
    movie_id: i32,
    title: String,
    description: String,
    poster_url: Option<String>,
    genre_id: i32,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ShowtimeRow {
    showtime_id: i32,
    movie_id: i32,
    start_time: DateTime<Utc>,
    price_cents: i32,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    seat_id: i32,
    seat_row: i32,
    seat_number: i32,
    is_reserved: bool,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Movie {
            movie_id: row.movie_id,
            title: row.title,
            description: row.description,
            poster_url: row.poster_url,
            genre_id: row.genre_id,
            created_at: row.created_at,
        }
    }
}

impl From<ShowtimeRow> for Showtime {
    fn from(row: ShowtimeRow) -> Self {
        Showtime {
            showtime_id: row.showtime_id,
            movie_id: row.movie_id,
            start_time: row.start_time,
            price_cents: row.price_cents,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn list_genres(&self) -> Result<Vec<Genre>, StoreError> {
        let rows = sqlx::query_as::<_, GenreRow>("SELECT genre_id, name FROM genres ORDER BY genre_id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| Genre { genre_id: row.genre_id, name: row.name })
            .collect())
    }

    async fn list_movies(&self, limit: i64, offset: i64) -> Result<Vec<Movie>, StoreError> {
        let rows = sqlx::query_as::<_, MovieRow>(
            "SELECT movie_id, title, description, poster_url, genre_id, created_at FROM movies ORDER BY movie_id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn get_movie(&self, movie_id: i32) -> Result<Movie, StoreError> {
        sqlx::query_as::<_, MovieRow>(
            "SELECT movie_id, title, description, poster_url, genre_id, created_at FROM movies WHERE movie_id = $1",
        )
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(Movie::from)
        .ok_or_else(|| StoreError::NotFound("movie".to_string()))
    }

    async fn create_movie(&self, movie: &NewMovie) -> Result<Movie, StoreError> {
        let row = sqlx::query_as::<_, MovieRow>(
            r#"
            INSERT INTO movies (title, description, poster_url, genre_id)
            VALUES ($1, $2, $3, $4)
            RETURNING movie_id, title, description, poster_url, genre_id, created_at
            "#,
        )
        .bind(&movie.title)
        .bind(&movie.description)
        .bind(&movie.poster_url)
        .bind(movie.genre_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                StoreError::NotFound("genre".to_string())
            }
            other => db_error(other),
        })?;

        Ok(row.into())
    }

    async fn update_movie(&self, movie_id: i32, update: &MovieUpdate) -> Result<Movie, StoreError> {
        let row = sqlx::query_as::<_, MovieRow>(
            r#"
            UPDATE movies
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                poster_url = COALESCE($4, poster_url),
                genre_id = COALESCE($5, genre_id)
            WHERE movie_id = $1
            RETURNING movie_id, title, description, poster_url, genre_id, created_at
            "#,
        )
        .bind(movie_id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(&update.poster_url)
        .bind(update.genre_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                StoreError::NotFound("genre".to_string())
            }
            other => db_error(other),
        })?;

        row.map(Into::into)
            .ok_or_else(|| StoreError::NotFound("movie".to_string()))
    }

    async fn delete_movie(&self, movie_id: i32) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM movies WHERE movie_id = $1")
            .bind(movie_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("movie".to_string()));
        }
        Ok(())
    }

    async fn get_showtime(&self, showtime_id: i32) -> Result<Showtime, StoreError> {
        sqlx::query_as::<_, ShowtimeRow>(
            "SELECT showtime_id, movie_id, start_time, price_cents, created_at FROM showtimes WHERE showtime_id = $1",
        )
        .bind(showtime_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(Showtime::from)
        .ok_or_else(|| StoreError::NotFound("showtime".to_string()))
    }

    async fn create_showtime(&self, showtime: &NewShowtime) -> Result<Showtime, StoreError> {
        let row = sqlx::query_as::<_, ShowtimeRow>(
            r#"
            INSERT INTO showtimes (movie_id, start_time, price_cents)
            VALUES ($1, $2, $3)
            RETURNING showtime_id, movie_id, start_time, price_cents, created_at
            "#,
        )
        .bind(showtime.movie_id)
        .bind(showtime.start_time)
        .bind(showtime.price_cents)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                StoreError::NotFound("movie".to_string())
            }
            other => db_error(other),
        })?;

        Ok(row.into())
    }

    async fn list_showtimes_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Showtime>, StoreError> {
        let rows = sqlx::query_as::<_, ShowtimeRow>(
            r#"
            SELECT showtime_id, movie_id, start_time, price_cents, created_at
            FROM showtimes
            WHERE start_time >= $1 AND start_time < $2
            ORDER BY start_time
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Showtime::from).collect())
    }

    async fn delete_showtime(&self, showtime_id: i32) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM showtimes WHERE showtime_id = $1")
            .bind(showtime_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("showtime".to_string()));
        }
        Ok(())
    }

    async fn list_seats_for_showtime(
        &self,
        showtime_id: i32,
    ) -> Result<Vec<SeatAvailability>, StoreError> {
        // Surface a missing showtime instead of an all-free seat map.
        self.get_showtime(showtime_id).await?;

        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT s.seat_id, s.seat_row, s.seat_number,
                   EXISTS (
                       SELECT 1 FROM reservations r
                       WHERE r.showtime_id = $1 AND r.seat_id = s.seat_id
                   ) AS is_reserved
            FROM seats s
            ORDER BY s.seat_row, s.seat_number
            "#,
        )
        .bind(showtime_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| SeatAvailability {
                seat_id: row.seat_id,
                row: row.seat_row,
                number: row.seat_number,
                is_reserved: row.is_reserved,
            })
            .collect())
    }
}
