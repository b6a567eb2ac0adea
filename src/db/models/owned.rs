//! The contract shared by every record type that belongs to a single user.
//!
//! Every operation takes the caller's id and only ever sees that caller's
//! rows. A record owned by someone else is reported exactly like a missing
//! one, so callers cannot learn whether other users' records exist.

use async_trait::async_trait;

use crate::db::DbPool;
use crate::error::{Error, Result};

#[async_trait]
pub trait OwnedRepository: Sized + Send {
    /// Validated payload for `create`
    type Create: Sync;
    /// Partial update; every field optional
    type Update: Sync;

    /// Entity name used in not-found messages
    const ENTITY: &'static str;

    async fn create(db: &DbPool, input: &Self::Create, owner_id: &str) -> Result<Self>;

    async fn find_all(db: &DbPool, owner_id: &str) -> Result<Vec<Self>>;

    async fn find_one(db: &DbPool, id: &str, owner_id: &str) -> Result<Self>;

    async fn update(db: &DbPool, id: &str, patch: &Self::Update, owner_id: &str) -> Result<Self>;

    async fn remove(db: &DbPool, id: &str, owner_id: &str) -> Result<()>;

    fn not_found(id: &str) -> Error {
        Error::not_found(Self::ENTITY, id)
    }
}
