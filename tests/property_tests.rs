use std::collections::BTreeSet;

use forumql::query::forum::{forum_schema, POST};
use forumql::query::{
    compile, search, ComparisonOperator, Expression, InMemorySchema, InMemoryStore,
    MembershipOperator, PresenceOperator, Record, SearchRequest,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct PostRow {
    title: String,
    votes: Option<i64>,
}

fn arb_post() -> impl Strategy<Value = PostRow> {
    (
        prop::sample::select(vec!["alpha", "beta", "gamma", "alphabet"]),
        prop::option::weighted(0.85, -5i64..25),
    )
        .prop_map(|(title, votes)| PostRow {
            title: title.to_owned(),
            votes,
        })
}

fn arb_leaf() -> impl Strategy<Value = Expression> {
    let ops = vec![
        ComparisonOperator::Equal,
        ComparisonOperator::NotEqual,
        ComparisonOperator::GreaterThan,
        ComparisonOperator::GreaterThanEqual,
        ComparisonOperator::LessThan,
        ComparisonOperator::LessThanEqual,
    ];
    prop_oneof![
        (prop::sample::select(ops), -5i64..25)
            .prop_map(|(op, v)| Expression::compare(op, "votes", v.to_string())),
        prop::sample::select(vec!["alpha", "bet", "a"])
            .prop_map(|p| Expression::compare(ComparisonOperator::StartsWith, "title", p)),
        prop::collection::vec(-5i64..25, 1..4).prop_map(|vs| Expression::membership(
            MembershipOperator::In,
            "votes",
            vs.into_iter().map(|v| v.to_string())
        )),
        (-5i64..25, -5i64..25).prop_map(|(a, b)| Expression::between(
            "votes",
            a.to_string(),
            b.to_string()
        )),
        Just(Expression::presence(PresenceOperator::Empty, "votes")),
    ]
}

fn store_of(rows: &[PostRow]) -> InMemoryStore {
    InMemoryStore::new().with_records(
        POST,
        rows.iter().enumerate().map(|(idx, row)| {
            let record = Record::new(idx as i64).with("title", row.title.as_str());
            match row.votes {
                Some(votes) => record.with("votes", votes),
                None => record.with_null("votes"),
            }
        }),
    )
}

fn matching(schema: &InMemorySchema, store: &InMemoryStore, filter: Expression) -> BTreeSet<i64> {
    let request = SearchRequest::page(0, 1_000).with_filter(filter);
    search(schema, store, POST, &request)
        .expect("search")
        .items
        .iter()
        .map(Record::id)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_and_is_intersection(
        rows in prop::collection::vec(arb_post(), 0..20),
        a in arb_leaf(),
        b in arb_leaf(),
    ) {
        let schema = forum_schema();
        let store = store_of(&rows);
        let left = matching(&schema, &store, a.clone());
        let right = matching(&schema, &store, b.clone());
        let both = matching(&schema, &store, Expression::and(vec![a, b]));
        prop_assert_eq!(both, left.intersection(&right).copied().collect::<BTreeSet<_>>());
    }

    #[test]
    fn prop_or_is_union(
        rows in prop::collection::vec(arb_post(), 0..20),
        a in arb_leaf(),
        b in arb_leaf(),
    ) {
        let schema = forum_schema();
        let store = store_of(&rows);
        let left = matching(&schema, &store, a.clone());
        let right = matching(&schema, &store, b.clone());
        let either = matching(&schema, &store, Expression::or(vec![a, b]));
        prop_assert_eq!(either, left.union(&right).copied().collect::<BTreeSet<_>>());
    }

    #[test]
    fn prop_not_is_complement(
        rows in prop::collection::vec(arb_post(), 0..20),
        a in arb_leaf(),
    ) {
        let schema = forum_schema();
        let store = store_of(&rows);
        let all: BTreeSet<i64> = (0..rows.len() as i64).collect();
        let inside = matching(&schema, &store, a.clone());
        let outside = matching(&schema, &store, Expression::not(a));
        prop_assert_eq!(outside, all.difference(&inside).copied().collect::<BTreeSet<_>>());
    }

    #[test]
    fn prop_not_in_complements_in_over_present_values(
        rows in prop::collection::vec(arb_post(), 0..20),
        values in prop::collection::vec(-5i64..25, 1..5),
    ) {
        let schema = forum_schema();
        let store = store_of(&rows);
        let literals: Vec<String> = values.iter().map(i64::to_string).collect();
        let inside = matching(
            &schema,
            &store,
            Expression::membership(MembershipOperator::In, "votes", literals.clone()),
        );
        let outside = matching(
            &schema,
            &store,
            Expression::membership(MembershipOperator::NotIn, "votes", literals),
        );
        prop_assert!(inside.is_disjoint(&outside));
        let all: BTreeSet<i64> = (0..rows.len() as i64).collect();
        let covered: BTreeSet<i64> = inside.union(&outside).copied().collect();
        prop_assert_eq!(covered, all);
    }

    #[test]
    fn prop_compilation_is_deterministic(a in arb_leaf(), b in arb_leaf()) {
        let schema = forum_schema();
        let expr = Expression::or(vec![a, Expression::not(b)]);
        let first = compile(&expr, &schema, POST).expect("compile");
        let second = compile(&expr, &schema, POST).expect("compile");
        prop_assert_eq!(first.predicate.to_string(), second.predicate.to_string());
        prop_assert_eq!(first.joins, second.joins);
    }
}
