//! Composable post query
//!
//! `PostQuery` collects the pieces a post listing can be built from (the
//! visibility filter, eager joins, the comment count annotation and a few
//! extra filters) and renders them into SQL. The rendered statement is the
//! conjunction of every requested piece, so the order in which the builder
//! methods are called never changes the result.
//!
//! ```ignore
//! let query = PostQuery::full_chain(Utc::now()).in_category(category.id);
//! let (sql, args) = (query.select_sql(true), query.args());
//! ```
//!
//! The SQL uses `?` placeholders only, which both SQLite and MySQL accept.

use chrono::{DateTime, Utc};

const POST_COLUMNS: &str = "p.id, p.title, p.text, p.pub_date, p.author_id, p.location_id, \
p.category_id, p.image, p.is_published, p.created_at";

const RELATION_COLUMNS: &str = "u.username AS author_username, \
u.first_name AS author_first_name, u.last_name AS author_last_name, \
c.title AS category_title, c.description AS category_description, \
c.slug AS category_slug, c.is_published AS category_is_published, \
c.created_at AS category_created_at, \
l.name AS location_name, l.is_published AS location_is_published, \
l.created_at AS location_created_at";

const COMMENT_COUNT_COLUMN: &str =
    "(SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count";

/// A value bound to one `?` placeholder, in statement order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryArg {
    Time(DateTime<Utc>),
    Id(i64),
}

/// Builder for post listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostQuery {
    published_at: Option<DateTime<Utc>>,
    relations: bool,
    comment_count: bool,
    post_id: Option<i64>,
    author_id: Option<i64>,
    category_id: Option<i64>,
}

impl PostQuery {
    /// All posts, no joins, no annotation
    pub fn new() -> Self {
        Self::default()
    }

    /// Published posts joined with their relations and annotated with
    /// comment counts. Public feeds use this unmodified.
    pub fn full_chain(now: DateTime<Utc>) -> Self {
        Self::new()
            .published(now)
            .with_relations()
            .with_comment_count()
    }

    /// Keep only posts that are published, not scheduled after `now`, and
    /// either uncategorized or filed under a published category.
    pub fn published(mut self, now: DateTime<Utc>) -> Self {
        self.published_at = Some(now);
        self
    }

    /// Eager-join author, category and location
    pub fn with_relations(mut self) -> Self {
        self.relations = true;
        self
    }

    /// Annotate each post with its number of comments
    pub fn with_comment_count(mut self) -> Self {
        self.comment_count = true;
        self
    }

    pub fn by_id(mut self, post_id: i64) -> Self {
        self.post_id = Some(post_id);
        self
    }

    pub fn by_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn has_relations(&self) -> bool {
        self.relations
    }

    pub fn has_comment_count(&self) -> bool {
        self.comment_count
    }

    pub fn is_published_only(&self) -> bool {
        self.published_at.is_some()
    }

    /// Row query, newest first. With `paginated`, two more placeholders
    /// (limit, offset) follow the ones reported by `args`.
    pub fn select_sql(&self, paginated: bool) -> String {
        let mut columns = vec![POST_COLUMNS];
        if self.relations {
            columns.push(RELATION_COLUMNS);
        }
        if self.comment_count {
            columns.push(COMMENT_COUNT_COLUMN);
        }

        let mut sql = format!(
            "SELECT {} FROM posts p{}{} ORDER BY p.pub_date DESC, p.id DESC",
            columns.join(", "),
            self.joins(),
            self.where_clause()
        );
        if paginated {
            sql.push_str(" LIMIT ? OFFSET ?");
        }
        sql
    }

    /// Total number of rows `select_sql` would return without pagination
    pub fn count_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM posts p{}{}",
            self.joins(),
            self.where_clause()
        )
    }

    /// Placeholder values shared by `select_sql` and `count_sql`
    pub fn args(&self) -> Vec<QueryArg> {
        let mut args = Vec::new();
        if let Some(now) = self.published_at {
            args.push(QueryArg::Time(now));
        }
        if let Some(id) = self.post_id {
            args.push(QueryArg::Id(id));
        }
        if let Some(id) = self.author_id {
            args.push(QueryArg::Id(id));
        }
        if let Some(id) = self.category_id {
            args.push(QueryArg::Id(id));
        }
        args
    }

    fn joins(&self) -> String {
        let mut joins = String::new();
        if self.relations {
            joins.push_str(" INNER JOIN users u ON u.id = p.author_id");
        }
        // The visibility filter reads the category flag.
        if self.relations || self.published_at.is_some() {
            joins.push_str(" LEFT JOIN categories c ON c.id = p.category_id");
        }
        if self.relations {
            joins.push_str(" LEFT JOIN locations l ON l.id = p.location_id");
        }
        joins
    }

    fn where_clause(&self) -> String {
        let mut conditions = Vec::new();
        if self.published_at.is_some() {
            conditions.push(
                "p.is_published = 1 AND p.pub_date <= ? \
                 AND (p.category_id IS NULL OR c.is_published = 1)",
            );
        }
        if self.post_id.is_some() {
            conditions.push("p.id = ?");
        }
        if self.author_id.is_some() {
            conditions.push("p.author_id = ?");
        }
        if self.category_id.is_some() {
            conditions.push("p.category_id = ?");
        }

        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }
}
