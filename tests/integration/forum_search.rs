#![allow(missing_docs)]

use forumql::query::forum::{forum_schema, COMMUNITY, POST, USER};
use forumql::query::{
    compile, search, ComparisonOperator, EntitySchema, Expression, InMemorySchema, InMemoryStore,
    LeafType, MembershipOperator, PresenceOperator, Record, SearchError, SearchExecutor,
    SearchRequest, SortExpression, UnknownPropertyError, ValidationError,
};
use serde_json::json;

fn ids(records: &[Record]) -> Vec<i64> {
    records.iter().map(Record::id).collect()
}

fn post(id: i64, title: &str, votes: i64) -> Record {
    Record::new(id).with("title", title).with("votes", votes)
}

fn comment(id: i64, text: &str) -> Record {
    Record::new(id).with("text", text).with("votes", 0i64)
}

#[test]
fn conjunction_filters_posts_and_reports_total() {
    let schema = forum_schema();
    let store = InMemoryStore::new().with_records(
        POST,
        [
            post(1, "x", 20),
            post(2, "x", 5),
            post(3, "x", 15),
            post(4, "y", 30),
            post(5, "z", 1),
        ],
    );
    let request = SearchRequest::page(0, 10)
        .with_filter(Expression::and(vec![
            Expression::equal("title", "x"),
            Expression::compare(ComparisonOperator::GreaterThan, "votes", "10"),
        ]))
        .sorted_by(SortExpression::asc("id"));
    let result = search(&schema, &store, POST, &request).expect("search");
    assert_eq!(ids(&result.items), vec![1, 3]);
    assert_eq!(result.total_count, Some(2));
}

#[test]
fn window_is_applied_after_sorting() {
    let schema = forum_schema();
    let store = InMemoryStore::new()
        .with_records(POST, (0..30).rev().map(|i| post(i, "p", i)));
    let request = SearchRequest::page(10, 5)
        .with_filter(Expression::compare(
            ComparisonOperator::GreaterThanEqual,
            "votes",
            "7",
        ))
        .sorted_by(SortExpression::asc("votes"));
    let result = search(&schema, &store, POST, &request).expect("search");
    assert_eq!(ids(&result.items), vec![17, 18, 19, 20, 21]);
    assert_eq!(result.total_count, Some(23));
}

#[test]
fn window_past_the_end_is_empty_but_counted() {
    let schema = forum_schema();
    let store = InMemoryStore::new().with_records(POST, (0..4).map(|i| post(i, "p", i)));
    let result = search(&schema, &store, POST, &SearchRequest::page(10, 5)).expect("search");
    assert!(result.items.is_empty());
    assert_eq!(result.total_count, Some(4));
}

#[test]
fn collection_filters_fan_out_unless_distinct() {
    let schema = forum_schema();
    let store = InMemoryStore::new().with_records(
        POST,
        [
            post(1, "a", 0).with_many(
                "comments",
                vec![comment(10, "rust is fun"), comment(11, "more rust")],
            ),
            post(2, "b", 0).with_many("comments", vec![comment(12, "rust again")]),
            post(3, "c", 0).with_many("comments", vec![comment(13, "python")]),
            post(4, "d", 0),
        ],
    );
    let filter = Expression::compare(ComparisonOperator::Contains, "comments.text", "rust");
    let request = SearchRequest::page(0, 10)
        .with_filter(filter)
        .sorted_by(SortExpression::asc("id"));

    let fanned = search(&schema, &store, POST, &request).expect("search");
    assert_eq!(ids(&fanned.items), vec![1, 1, 2]);
    assert_eq!(fanned.total_count, Some(3));

    let distinct = search(&schema, &store, POST, &request.clone().with_distinct(true))
        .expect("search");
    assert_eq!(ids(&distinct.items), vec![1, 2]);
    assert_eq!(distinct.total_count, Some(2));
}

#[test]
fn repeated_collection_prefix_shares_one_join() {
    let schema = forum_schema();
    let expr = Expression::and(vec![
        Expression::equal("members.username", "alice"),
        Expression::equal("members.name", "Alice"),
        Expression::equal("owner.username", "bob"),
    ]);
    let compiled = compile(&expr, &schema, COMMUNITY).expect("compile");
    assert_eq!(compiled.joins.len(), 1);
    assert_eq!(compiled.joins[0].path, "members");
    assert_eq!(compiled.joins[0].entity, USER);
}

#[test]
fn shared_join_binds_both_conditions_to_the_same_member() {
    let schema = forum_schema();
    let store = InMemoryStore::new().with_records(
        COMMUNITY,
        [
            Record::new(1).with("name", "split").with_many(
                "members",
                vec![
                    Record::new(100).with("username", "alice").with("name", "Bob"),
                    Record::new(101).with("username", "bob").with("name", "Alice"),
                ],
            ),
            Record::new(2).with("name", "joined").with_many(
                "members",
                vec![Record::new(102).with("username", "alice").with("name", "Alice")],
            ),
        ],
    );
    let request = SearchRequest::page(0, 10).with_filter(Expression::and(vec![
        Expression::equal("members.username", "alice"),
        Expression::equal("members.name", "Alice"),
    ]));
    let result = search(&schema, &store, COMMUNITY, &request).expect("search");
    assert_eq!(ids(&result.items), vec![2]);
}

#[test]
fn inverted_between_matches_nothing() {
    let schema = forum_schema();
    let store = InMemoryStore::new().with_records(POST, (0..10).map(|i| post(i, "p", i)));
    let request = SearchRequest::page(0, 10).with_filter(Expression::between("votes", "8", "2"));
    let result = search(&schema, &store, POST, &request).expect("search");
    assert!(result.items.is_empty());
    assert_eq!(result.total_count, Some(0));

    let request = SearchRequest::page(0, 10).with_filter(Expression::between("votes", "2", "4"));
    let result = search(&schema, &store, POST, &request).expect("search");
    assert_eq!(result.total_count, Some(3));
}

#[test]
fn not_in_is_the_complement_of_in() {
    let schema = forum_schema();
    let store = InMemoryStore::new().with_records(POST, (1..=6).map(|i| post(i, "p", i * 10)));
    let values = ["10", "30", "60"];
    let inside = SearchRequest::page(0, 10)
        .with_filter(Expression::membership(MembershipOperator::In, "votes", values))
        .sorted_by(SortExpression::asc("id"));
    let outside = SearchRequest::page(0, 10)
        .with_filter(Expression::membership(MembershipOperator::NotIn, "votes", values))
        .sorted_by(SortExpression::asc("id"));
    let inside = search(&schema, &store, POST, &inside).expect("in");
    let outside = search(&schema, &store, POST, &outside).expect("not in");
    assert_eq!(ids(&inside.items), vec![1, 3, 6]);
    assert_eq!(ids(&outside.items), vec![2, 4, 5]);
}

#[test]
fn presence_checks_follow_missing_references() {
    let schema = forum_schema();
    let store = InMemoryStore::new().with_records(
        POST,
        [
            post(1, "a", 0).with_one("author", Record::new(7).with("username", "ann")),
            post(2, "b", 0),
            post(3, "c", 0).with_null("author"),
        ],
    );
    let empty = SearchRequest::page(0, 10)
        .with_filter(Expression::presence(PresenceOperator::Empty, "author.username"))
        .sorted_by(SortExpression::asc("id"));
    let present = SearchRequest::page(0, 10)
        .with_filter(Expression::presence(PresenceOperator::NotEmpty, "author.username"));
    assert_eq!(
        ids(&search(&schema, &store, POST, &empty).expect("empty").items),
        vec![2, 3]
    );
    assert_eq!(
        ids(&search(&schema, &store, POST, &present).expect("present").items),
        vec![1]
    );
}

#[test]
fn decimal_leaf_rejects_non_numeric_literal() {
    let schema = InMemorySchema::new().with_entity(
        EntitySchema::new("Product")
            .with_leaf("id", LeafType::Integer)
            .with_leaf("price", LeafType::Decimal),
    );
    let price: bigdecimal::BigDecimal = "19.99".parse().expect("price");
    let store =
        InMemoryStore::new().with_records("Product", [Record::new(1).with("price", price)]);
    let bad = SearchRequest::page(0, 10).with_filter(Expression::compare(
        ComparisonOperator::LessThan,
        "price",
        "abc",
    ));
    let err = search(&schema, &store, "Product", &bad).expect_err("coercion");
    assert!(matches!(err, SearchError::Coercion(_)), "{err:?}");
    assert!(err.to_string().contains("abc"));

    let good = SearchRequest::page(0, 10).with_filter(Expression::compare(
        ComparisonOperator::LessThan,
        "price",
        "20.00",
    ));
    assert_eq!(
        search(&schema, &store, "Product", &good).expect("search").total_count,
        Some(1)
    );
}

#[test]
fn structural_and_path_errors_are_reported_by_kind() {
    let schema = forum_schema();
    let store = InMemoryStore::new().with_records(POST, [post(1, "a", 1)]);

    let lonely_and = SearchRequest::page(0, 10)
        .with_filter(Expression::and(vec![Expression::equal("title", "a")]));
    match search(&schema, &store, POST, &lonely_and) {
        Err(SearchError::Validation(ValidationError::TooFewOperands { found, .. })) => {
            assert_eq!(found, 1)
        }
        other => panic!("expected TooFewOperands, got {other:?}"),
    }

    let blank_property =
        SearchRequest::page(0, 10).with_filter(Expression::equal("", "a"));
    assert!(matches!(
        search(&schema, &store, POST, &blank_property),
        Err(SearchError::Validation(ValidationError::PropertyRequired { .. }))
    ));

    let unknown = SearchRequest::page(0, 10).with_filter(Expression::equal("author.nickname", "a"));
    match search(&schema, &store, POST, &unknown) {
        Err(SearchError::UnknownProperty(UnknownPropertyError::UnknownSegment {
            entity,
            segment,
            ..
        })) => {
            assert_eq!(entity, USER);
            assert_eq!(segment, "nickname");
        }
        other => panic!("expected UnknownSegment, got {other:?}"),
    }

    let err = search(&schema, &store, "Spaceship", &SearchRequest::page(0, 1))
        .expect_err("unknown entity");
    assert_eq!(err.code(), "UnknownEntity");
}

#[test]
fn json_dataset_and_request_round_through_the_executor() {
    let schema = forum_schema();
    let data = json!({
        "Post": [
            {"id": 1, "title": "Rust tips", "votes": 12,
             "author": {"id": 9, "username": "ferris"},
             "createdAt": "2024-03-01T10:00:00"},
            {"id": 2, "title": "Go tips", "votes": 40,
             "author": {"id": 8, "username": "gopher"},
             "createdAt": "2024-02-01T10:00:00"},
            {"id": 3, "title": "Rust again", "votes": 3,
             "author": null,
             "createdAt": "2024-04-01T10:00:00"}
        ]
    });
    let store = InMemoryStore::from_json(&schema, &data).expect("dataset");
    let request = SearchRequest::from_json(
        r#"{
            "startIndex": 0,
            "count": 5,
            "filter": {
                "operator": "Or",
                "operands": [
                    {"operator": "StartWith", "property": "title", "value": "Rust"},
                    {"operator": "GreaterThan", "property": "votes", "value": 30}
                ]
            },
            "sorts": [{"property": "createdAt", "mode": "Desc"}]
        }"#,
    )
    .expect("request");
    let result = SearchExecutor::new(&schema, &store)
        .search_map(POST, &request, |record| record.to_json())
        .expect("search");
    let titles: Vec<_> = result
        .items
        .iter()
        .map(|item| item["title"].as_str().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(titles, vec!["Rust again", "Rust tips", "Go tips"]);
    assert_eq!(result.total_count, Some(3));
}
