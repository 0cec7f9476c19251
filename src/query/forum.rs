#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Entity schemas of the forum domain.

use super::schema::{EntitySchema, EnumType, InMemorySchema, LeafType};

pub const USER: &str = "User";
pub const POST: &str = "Post";
pub const COMMENT: &str = "Comment";
pub const COMMUNITY: &str = "Community";
pub const VOTE: &str = "Vote";
pub const NOTIFICATION: &str = "Notification";
pub const PREFERENCES: &str = "Preferences";
pub const POST_ATTACHMENT: &str = "PostAttachment";

/// Kinds of content a vote can target.
pub fn votable_type() -> EnumType {
    EnumType::new("VotableType", ["POST", "COMMENT"])
}

/// Auditing columns shared by posts and comments.
fn audited(entity: EntitySchema) -> EntitySchema {
    entity
        .with_leaf("createdAt", LeafType::DateTime)
        .with_leaf("lastModifiedDate", LeafType::Instant)
        .with_leaf("version", LeafType::Integer)
}

/// Builds the schema of every searchable forum entity.
pub fn forum_schema() -> InMemorySchema {
    InMemorySchema::new()
        .with_entity(
            EntitySchema::new(USER)
                .with_leaf("id", LeafType::Integer)
                .with_leaf("username", LeafType::String)
                .with_leaf("name", LeafType::String)
                .with_leaf("family", LeafType::String)
                .with_leaf("email", LeafType::String)
                .with_leaf("description", LeafType::String)
                .with_leaf("birthDate", LeafType::Date)
                .with_leaf("enabled", LeafType::Boolean)
                .with_leaf("createdDate", LeafType::Date)
                .with_reference("preferences", PREFERENCES)
                .with_collection("joinedCommunities", COMMUNITY)
                .with_collection("ownedCommunities", COMMUNITY)
                .with_collection("posts", POST)
                .with_collection("comments", COMMENT)
                .with_collection("notifications", NOTIFICATION),
        )
        .with_entity(audited(
            EntitySchema::new(POST)
                .with_leaf("id", LeafType::Integer)
                .with_leaf("title", LeafType::String)
                .with_leaf("content", LeafType::String)
                .with_leaf("votes", LeafType::Integer)
                .with_reference("author", USER)
                .with_reference("community", COMMUNITY)
                .with_collection("comments", COMMENT)
                .with_collection("attachments", POST_ATTACHMENT),
        ))
        .with_entity(audited(
            EntitySchema::new(COMMENT)
                .with_leaf("id", LeafType::Integer)
                .with_leaf("text", LeafType::String)
                .with_leaf("votes", LeafType::Integer)
                .with_leaf("deleted", LeafType::Boolean)
                .with_reference("author", USER)
                .with_reference("post", POST)
                .with_reference("parent", COMMENT)
                .with_collection("replies", COMMENT),
        ))
        .with_entity(
            EntitySchema::new(COMMUNITY)
                .with_leaf("id", LeafType::Integer)
                .with_leaf("name", LeafType::String)
                .with_leaf("description", LeafType::String)
                .with_leaf("createdAt", LeafType::Date)
                .with_reference("owner", USER)
                .with_collection("members", USER)
                .with_collection("posts", POST),
        )
        .with_entity(
            EntitySchema::new(VOTE)
                .with_leaf("id", LeafType::Integer)
                .with_leaf("value", LeafType::Integer)
                .with_leaf("votableType", LeafType::Enumeration(votable_type()))
                .with_leaf("votableId", LeafType::Integer)
                .with_leaf("createdAt", LeafType::DateTime)
                .with_reference("user", USER),
        )
        .with_entity(
            EntitySchema::new(NOTIFICATION)
                .with_leaf("id", LeafType::Integer)
                .with_leaf("type", LeafType::String)
                .with_leaf("message", LeafType::String)
                .with_leaf("createdAt", LeafType::DateTime)
                .with_leaf("read", LeafType::Boolean)
                .with_reference("recipient", USER),
        )
        .with_entity(
            EntitySchema::new(PREFERENCES)
                .with_leaf("id", LeafType::Integer)
                .with_leaf("emailNotifications", LeafType::Boolean)
                .with_leaf("theme", LeafType::String)
                .with_leaf("language", LeafType::String)
                .with_leaf("showNsfw", LeafType::Boolean),
        )
        .with_entity(
            EntitySchema::new(POST_ATTACHMENT)
                .with_leaf("id", LeafType::Integer)
                .with_leaf("filename", LeafType::String)
                .with_leaf("contentType", LeafType::String)
                .with_leaf("size", LeafType::Integer)
                .with_leaf("data", LeafType::Opaque("bytes".into()))
                .with_reference("post", POST),
        )
}
