//! Collection aggregate loading against an in-memory SQLite database
//!
//! Fixture: two posts. The first has two comments (with two and one comment
//! likes) and one like; the second has nothing.

use std::sync::Arc;

use tally_orm::{
    connect, Collection, DatabaseConfig, DatabasePool, DatabasePoolConfig, DatabaseValue, Entity, FilterBuilder,
    HasMany, Model, ModelError, QueryLoggingPool, RelationRegistry, RelationTarget,
};

struct Post;

impl Model for Post {
    fn table_name() -> &'static str {
        "posts"
    }

    fn soft_delete_column() -> Option<&'static str> {
        Some("deleted_at")
    }

    fn default_attributes() -> Vec<(&'static str, DatabaseValue)> {
        vec![("some_default_value", DatabaseValue::Int64(100))]
    }

    fn relations() -> RelationRegistry {
        RelationRegistry::new()
            .define("comments", HasMany::of::<Comment>("post_id"))
            .define(
                "commentWithLikes",
                HasMany::of::<Comment>("post_id").join("comment_likes", "comment_likes.comment_id", "comments.id"),
            )
            .define("likes", HasMany::of::<Like>("post_id"))
    }
}

struct Comment;

impl Model for Comment {
    fn table_name() -> &'static str {
        "comments"
    }

    fn relations() -> RelationRegistry {
        RelationRegistry::new().define("likes", HasMany::of::<CommentLike>("comment_id"))
    }
}

struct Like;

impl Model for Like {
    fn table_name() -> &'static str {
        "likes"
    }
}

struct CommentLike;

impl Model for CommentLike {
    fn table_name() -> &'static str {
        "comment_likes"
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, some_default_value INTEGER NOT NULL, deleted_at TEXT)",
    "CREATE TABLE comments (id INTEGER PRIMARY KEY AUTOINCREMENT, post_id INTEGER NOT NULL, votes INTEGER NOT NULL DEFAULT 0, approved BOOLEAN NOT NULL DEFAULT 0)",
    "CREATE TABLE likes (id INTEGER PRIMARY KEY AUTOINCREMENT, post_id INTEGER NOT NULL)",
    "CREATE TABLE comment_likes (id INTEGER PRIMARY KEY AUTOINCREMENT, comment_id INTEGER NOT NULL)",
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn setup() -> QueryLoggingPool {
    init_tracing();

    let config = DatabaseConfig::new("sqlite::memory:").with_pool(DatabasePoolConfig::single_connection());
    let inner: Arc<dyn DatabasePool> = connect(&config).await.unwrap();
    let pool = QueryLoggingPool::new(inner);

    for statement in SCHEMA {
        pool.execute(statement, &[]).await.unwrap();
    }

    let mut post = Entity::<Post>::new();
    post.save(&pool).await.unwrap();
    let post_id = post.key().cloned().unwrap();

    let mut comment_ids = Vec::new();
    for (votes, approved) in [(3i64, true), (4i64, false)] {
        let mut comment = Entity::<Comment>::new()
            .with("post_id", post_id.clone())
            .with("votes", votes)
            .with("approved", approved);
        comment.save(&pool).await.unwrap();
        comment_ids.push(comment.key().cloned().unwrap());
    }

    for comment_id in [&comment_ids[0], &comment_ids[0], &comment_ids[1]] {
        Entity::<CommentLike>::new()
            .with("comment_id", comment_id.clone())
            .save(&pool)
            .await
            .unwrap();
    }

    Entity::<Like>::new().with("post_id", post_id).save(&pool).await.unwrap();

    Entity::<Post>::new().save(&pool).await.unwrap();

    pool
}

fn int(value: i64) -> DatabaseValue {
    DatabaseValue::Int64(value)
}

#[tokio::test]
async fn test_load_count() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();

    pool.enable_query_log();
    posts.load_count(&pool, "comments").await.unwrap();

    assert_eq!(pool.query_log().len(), 1);
    assert_eq!(posts[0].get("comments_count"), Some(&int(2)));
    assert_eq!(posts[1].get("comments_count"), Some(&int(0)));
    assert_eq!(posts[0].get_original("comments_count"), Some(&int(2)));
    assert!(!posts[0].is_dirty("comments_count"));
}

#[tokio::test]
async fn test_load_count_on_deleted_models() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();
    for post in posts.iter_mut() {
        post.delete(&pool).await.unwrap();
    }
    assert!(posts.iter().all(|post| post.is_trashed()));

    pool.enable_query_log();
    posts.load_count(&pool, "comments").await.unwrap();

    assert_eq!(pool.query_log().len(), 1);
    assert_eq!(posts[0].get("comments_count"), Some(&int(2)));
    assert_eq!(posts[1].get("comments_count"), Some(&int(0)));
}

#[tokio::test]
async fn test_load_count_with_array_of_relations() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();

    pool.enable_query_log();
    posts.load_count(&pool, ["comments", "likes"]).await.unwrap();

    assert_eq!(pool.query_log().len(), 1);
    assert_eq!(posts[0].get("comments_count"), Some(&int(2)));
    assert_eq!(posts[0].get("likes_count"), Some(&int(1)));
    assert_eq!(posts[1].get("comments_count"), Some(&int(0)));
    assert_eq!(posts[1].get("likes_count"), Some(&int(0)));
}

#[tokio::test]
async fn test_load_count_does_not_override_attributes_with_default_value() {
    let pool = setup().await;
    let mut post = Entity::<Post>::first(&pool).await.unwrap().unwrap();
    post.set("some_default_value", 200i64);

    let mut posts = Collection::make([post]);
    posts.load_count(&pool, "comments").await.unwrap();

    assert_eq!(posts[0].get("some_default_value"), Some(&int(200)));
    assert!(posts[0].is_dirty("some_default_value"));
    assert_eq!(posts[0].get("comments_count"), Some(&int(2)));
}

#[tokio::test]
async fn test_load_count_as_stated() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();

    pool.enable_query_log();
    posts.load_count_as_stated(&pool, "commentWithLikes").await.unwrap();

    assert_eq!(pool.query_log().len(), 1);
    assert_eq!(posts[0].get("comment_with_likes_count"), Some(&int(3)));
    assert_eq!(posts[1].get("comment_with_likes_count"), Some(&int(0)));
    assert_eq!(posts[0].get_original("comment_with_likes_count"), Some(&int(3)));
}

#[tokio::test]
async fn test_load_count_as_stated_on_deleted_models() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();
    for post in posts.iter_mut() {
        post.delete(&pool).await.unwrap();
    }

    pool.enable_query_log();
    posts.load_count_as_stated(&pool, "commentWithLikes").await.unwrap();

    assert_eq!(pool.query_log().len(), 1);
    assert_eq!(posts[0].get("comment_with_likes_count"), Some(&int(3)));
    assert_eq!(posts[1].get("comment_with_likes_count"), Some(&int(0)));
}

#[tokio::test]
async fn test_load_count_as_stated_with_array_of_relations() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();

    pool.enable_query_log();
    posts
        .load_count_as_stated(&pool, ["comments", "commentWithLikes", "likes"])
        .await
        .unwrap();

    assert_eq!(pool.query_log().len(), 1);
    assert_eq!(posts[0].get("comments_count"), Some(&int(2)));
    assert_eq!(posts[0].get("comment_with_likes_count"), Some(&int(3)));
    assert_eq!(posts[0].get("likes_count"), Some(&int(1)));
    assert_eq!(posts[1].get("comments_count"), Some(&int(0)));
    assert_eq!(posts[1].get("comment_with_likes_count"), Some(&int(0)));
    assert_eq!(posts[1].get("likes_count"), Some(&int(0)));
}

#[tokio::test]
async fn test_load_count_as_stated_does_not_override_attributes_with_default_value() {
    let pool = setup().await;
    let mut post = Entity::<Post>::first(&pool).await.unwrap().unwrap();
    post.set("some_default_value", 200i64);

    let mut posts = Collection::make([post]);
    posts.load_count_as_stated(&pool, "commentWithLikes").await.unwrap();

    assert_eq!(posts[0].get("some_default_value"), Some(&int(200)));
    assert_eq!(posts[0].get("comment_with_likes_count"), Some(&int(3)));
}

#[tokio::test]
async fn test_load_count_as_stated_rejects_call_filters() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();

    pool.enable_query_log();
    let target = RelationTarget::new("comments").where_eq("approved", true);
    let result = posts.load_count_as_stated(&pool, target).await;

    assert!(matches!(result, Err(ModelError::Validation(_))));
    assert!(pool.query_log().is_empty());
    assert_eq!(posts[0].get("comments_count"), None);
}

#[tokio::test]
async fn test_unknown_relation_issues_no_query() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();

    pool.enable_query_log();
    let result = posts.load_count(&pool, ["comments", "authors"]).await;

    assert_eq!(result, Err(ModelError::invalid_relation("posts", "authors")));
    assert!(pool.query_log().is_empty());
    assert_eq!(posts[0].get("comments_count"), None);
}

#[tokio::test]
async fn test_empty_collection_issues_no_query() {
    let pool = setup().await;
    let mut posts = Collection::<Post>::default();

    pool.enable_query_log();
    posts.load_count(&pool, "comments").await.unwrap();

    assert!(pool.query_log().is_empty());
}

#[tokio::test]
async fn test_unsaved_entities_get_defaults_without_query() {
    let pool = setup().await;
    let mut posts = Collection::make([Entity::<Post>::new()]);

    pool.enable_query_log();
    posts.load_count(&pool, "comments").await.unwrap();

    assert!(pool.query_log().is_empty());
    assert_eq!(posts[0].get("comments_count"), Some(&int(0)));
    assert!(!posts[0].is_dirty("comments_count"));
}

#[tokio::test]
async fn test_query_failure_leaves_entities_untouched() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();
    pool.execute("DROP TABLE likes", &[]).await.unwrap();

    pool.enable_query_log();
    let result = posts.load_count(&pool, ["comments", "likes"]).await;

    assert!(matches!(result, Err(ModelError::QueryExecution(_))));
    assert_eq!(pool.query_log().len(), 1);
    assert!(posts.iter().all(|post| post.get("comments_count").is_none()));
    assert!(posts.iter().all(|post| post.is_clean()));
}

#[tokio::test]
async fn test_aliases_and_duplicates() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();

    pool.enable_query_log();
    posts
        .load_count(&pool, vec!["comments as total_comments", "comments as total_comments", "likes"])
        .await
        .unwrap();
    posts.load_count(&pool, ("commentWithLikes", "liked_comments")).await.unwrap();

    let log = pool.query_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].sql.matches(r#"AS "total_comments""#).count(), 1);
    assert_eq!(log[0].sql.matches("SELECT COUNT(*)").count(), 2);
    assert_eq!(posts[0].get("total_comments"), Some(&int(2)));
    assert_eq!(posts[0].get("comments_count"), None);
    assert_eq!(posts[0].get("likes_count"), Some(&int(1)));
    assert_eq!(posts[0].get("liked_comments"), Some(&int(3)));
    assert_eq!(posts[1].get("liked_comments"), Some(&int(0)));
}

#[tokio::test]
async fn test_load_count_beyond_parameter_limit() {
    let pool = setup().await;
    pool.execute(
        "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 40000) \
         INSERT INTO posts (some_default_value) SELECT 100 FROM seq",
        &[],
    )
    .await
    .unwrap();
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();
    assert!(posts.len() > 32_766);

    pool.enable_query_log();
    posts.load_count(&pool, "comments").await.unwrap();

    assert_eq!(pool.query_log().len(), 1);
    assert_eq!(posts[0].get("comments_count"), Some(&int(2)));
    assert!(posts.iter().skip(1).all(|post| post.get("comments_count") == Some(&int(0))));
}

#[tokio::test]
async fn test_call_filters_constrain_one_aggregate() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();

    pool.enable_query_log();
    posts
        .load_count(
            &pool,
            vec![
                RelationTarget::new("comments"),
                RelationTarget::new("comments as approved_comments").where_eq("approved", true),
            ],
        )
        .await
        .unwrap();

    assert_eq!(pool.query_log().len(), 1);
    assert_eq!(posts[0].get("comments_count"), Some(&int(2)));
    assert_eq!(posts[0].get("approved_comments"), Some(&int(1)));
    assert_eq!(posts[1].get("approved_comments"), Some(&int(0)));
}

#[tokio::test]
async fn test_sum_max_and_exists() {
    let pool = setup().await;
    let mut posts = Entity::<Post>::all(&pool).await.unwrap();

    pool.enable_query_log();
    posts.load_sum(&pool, "comments", "votes").await.unwrap();
    posts.load_max(&pool, "comments", "votes").await.unwrap();
    posts.load_exists(&pool, ["comments", "likes"]).await.unwrap();

    assert_eq!(pool.query_log().len(), 3);
    assert_eq!(posts[0].get("comments_sum_votes"), Some(&DatabaseValue::Float64(7.0)));
    assert_eq!(posts[1].get("comments_sum_votes"), Some(&DatabaseValue::Null));
    assert_eq!(posts[0].get("comments_max_votes"), Some(&int(4)));
    assert_eq!(posts[0].get("comments_exists"), Some(&DatabaseValue::Bool(true)));
    assert_eq!(posts[0].get("likes_exists"), Some(&DatabaseValue::Bool(true)));
    assert_eq!(posts[1].get("likes_exists"), Some(&DatabaseValue::Bool(false)));
    assert!(!posts[0].is_dirty("comments_sum_votes"));
}

#[tokio::test]
async fn test_load_count_on_child_collection() {
    let pool = setup().await;
    let mut comments = Entity::<Comment>::all(&pool).await.unwrap();

    comments.load_count(&pool, "likes").await.unwrap();

    let counts: Vec<_> = comments.iter().map(|c| c.get("likes_count").cloned()).collect();
    assert_eq!(counts, vec![Some(DatabaseValue::Int64(2)), Some(DatabaseValue::Int64(1))]);
}
