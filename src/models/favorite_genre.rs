//! Favorite genre model

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::enums::Genre;

/// A user's declared interest in a genre, pinned to that genre's bestseller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FavoriteGenre {
    pub id: i64,
    pub user_id: i64,
    pub genre: Genre,
    pub book_id: i64,
}
