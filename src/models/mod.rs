//! Data models for Book Journey

pub mod book;
pub mod enums;
pub mod favorite_genre;

// Re-export commonly used types
pub use book::{Book, GenreBestseller, NewBook};
pub use enums::Genre;
pub use favorite_genre::FavoriteGenre;
