//! Data models
//!
//! This module contains the data structures used throughout Blogicum:
//! - Database entities (User, Session, Category, Location, Post, Comment)
//! - Joined read models (PostListItem, CommentWithAuthor)
//! - Pagination types

mod category;
mod comment;
mod location;
pub mod pagination;
mod post;
mod session;
mod user;

pub use category::{is_valid_slug, Category, CreateCategoryInput, UpdateCategoryInput};
pub use comment::{Comment, CommentWithAuthor};
pub use location::{CreateLocationInput, Location, UpdateLocationInput};
pub use pagination::{ListParams, PagedResult, POSTS_PER_PAGE};
pub use post::{Post, PostInput, PostListItem, POST_IMAGE_DIR};
pub use session::Session;
pub use user::{is_valid_username, AuthorSummary, UpdateProfileInput, User, UserRole, USERNAME_MAX_LEN};
