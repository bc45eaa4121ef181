//! Services layer - Business logic
//!
//! This module contains all business logic services for Blogicum.
//! Services are responsible for:
//! - Implementing business rules (visibility, authorship)
//! - Coordinating between repositories and cache
//! - Handling validation and error cases

pub mod category;
pub mod comment;
pub mod location;
pub mod media;
pub mod password;
pub mod post;
pub mod user;

pub use category::{CategoryService, CategoryServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use location::{LocationService, LocationServiceError};
pub use media::{MediaError, MediaService};
pub use password::{hash_password, verify_password};
pub use post::{can_view, PostService, PostServiceError};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
