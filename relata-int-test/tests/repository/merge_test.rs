use relata::clause;
use relata::common::SortOrder;
use relata::query::{JoinSpec, OrderBy, SelectParams, WhereClause};
use relata_int_test::test_util::{
    cleanup, create_symmetric_test_context, create_test_context, run_test,
};

#[test]
fn test_explicit_where_followed_by_accumulated_group() {
    run_test(
        create_test_context,
        |ctx| {
            let mut accounts = ctx.repository("Account")?;
            accounts.where_clause(clause! { "type" => "Customer", "rating>" => 1 });

            let effective = accounts.get_select_params(
                SelectParams::new().where_clause(clause! { "name" => "Acme" }),
            );
            let expected = clause! { "name" => "Acme" }
                .group(clause! { "type" => "Customer", "rating>" => 1 });
            assert_eq!(effective.get_where_clause(), Some(&expected));

            // merging does not consume the accumulated state
            assert!(!accounts.query_state().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_explicit_where_kept_without_accumulated() {
    run_test(
        create_test_context,
        |ctx| {
            let accounts = ctx.repository("Account")?;
            let explicit = clause! { "name" => "Acme" };

            let effective =
                accounts.get_select_params(SelectParams::new().where_clause(explicit.clone()));
            assert_eq!(effective.get_where_clause(), Some(&explicit));

            let effective = accounts.get_select_params(SelectParams::new());
            assert_eq!(effective.get_where_clause(), None);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_accumulated_where_used_without_explicit() {
    run_test(
        create_test_context,
        |ctx| {
            let mut accounts = ctx.repository("Account")?;
            accounts.where_eq("name", "Acme");

            let effective = accounts.get_select_params(SelectParams::new());
            let expected = WhereClause::new().group(clause! { "name" => "Acme" });
            assert_eq!(effective.get_where_clause(), Some(&expected));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_accumulated_having_dropped_without_explicit() {
    run_test(
        create_test_context,
        |ctx| {
            let mut accounts = ctx.repository("Account")?;
            accounts.having_clause(clause! { "COUNT:id>" => 2 });

            let effective = accounts.get_select_params(SelectParams::new());
            assert_eq!(effective.get_having_clause(), None);

            let effective =
                accounts.get_select_params(SelectParams::new().having_clause(WhereClause::new()));
            assert_eq!(effective.get_having_clause(), Some(&WhereClause::new()));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_accumulated_having_combined_with_explicit() {
    run_test(
        create_test_context,
        |ctx| {
            let mut accounts = ctx.repository("Account")?;
            accounts.having_clause(clause! { "COUNT:id>" => 2 });

            let effective = accounts.get_select_params(
                SelectParams::new().having_clause(clause! { "SUM:amount>" => 100 }),
            );
            let expected =
                clause! { "SUM:amount>" => 100 }.group(clause! { "COUNT:id>" => 2 });
            assert_eq!(effective.get_having_clause(), Some(&expected));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_accumulated_joins_need_explicit_joins() {
    run_test(
        create_test_context,
        |ctx| {
            let mut accounts = ctx.repository("Account")?;
            accounts.join("contacts").left_join(vec!["notes"]);

            let effective = accounts.get_select_params(SelectParams::new());
            assert!(effective.get_joins().is_empty());
            assert!(effective.get_left_joins().is_empty());

            let effective = accounts.get_select_params(
                SelectParams::new()
                    .join(("teams", "t"))
                    .left_join("parent"),
            );
            assert_eq!(
                effective.get_joins(),
                &[JoinSpec::new("teams").alias("t"), JoinSpec::new("contacts")]
            );
            assert_eq!(
                effective.get_left_joins(),
                &[JoinSpec::new("parent"), JoinSpec::new("notes")]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_symmetric_policy_keeps_having_and_joins() {
    run_test(
        create_symmetric_test_context,
        |ctx| {
            let mut accounts = ctx.repository("Account")?;
            accounts
                .having_clause(clause! { "COUNT:id>" => 2 })
                .join(["contacts", "notes"]);

            let effective = accounts.get_select_params(SelectParams::new());
            assert_eq!(
                effective.get_having_clause(),
                Some(&clause! { "COUNT:id>" => 2 })
            );
            assert_eq!(
                effective.get_joins(),
                &[JoinSpec::new("contacts"), JoinSpec::new("notes")]
            );

            let effective = accounts.get_select_params(
                SelectParams::new().having_clause(clause! { "SUM:amount>" => 100 }),
            );
            let expected =
                clause! { "SUM:amount>" => 100 }.group(clause! { "COUNT:id>" => 2 });
            assert_eq!(effective.get_having_clause(), Some(&expected));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_explicit_scalars_win() {
    run_test(
        create_test_context,
        |ctx| {
            let mut accounts = ctx.repository("Account")?;
            accounts
                .order("name", SortOrder::Ascending)
                .limit(10, 5)
                .select(&["name", "rating", "type"])
                .distinct();

            let effective = accounts.get_select_params(
                SelectParams::new()
                    .order_by("rating", SortOrder::Descending)
                    .offset(20)
                    .select(&["id"]),
            );

            assert_eq!(effective.get_order_by(), Some(&OrderBy::from("rating")));
            assert_eq!(effective.get_order(), Some(SortOrder::Descending));
            assert_eq!(effective.get_offset(), Some(20));
            assert_eq!(effective.get_limit(), Some(5));
            assert_eq!(effective.get_select(), &["id", "rating", "type"]);
            assert!(effective.is_distinct());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_order_lists_merge_by_position() {
    run_test(
        create_test_context,
        |ctx| {
            let mut accounts = ctx.repository("Account")?;
            accounts.order_list(vec![
                ("type", SortOrder::Ascending),
                ("name", SortOrder::Ascending),
            ]);

            let effective = accounts.get_select_params(
                SelectParams::new().order_by_list(vec![("rating", SortOrder::Descending)]),
            );
            assert_eq!(
                effective.get_order_by(),
                Some(&OrderBy::from(vec![
                    ("rating", SortOrder::Descending),
                    ("name", SortOrder::Ascending),
                ]))
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_explicit_false_flag_overrides_accumulated() {
    run_test(
        create_test_context,
        |ctx| {
            let mut accounts = ctx.repository("Account")?;
            accounts.distinct();

            let effective = accounts.get_select_params(SelectParams::new());
            assert!(effective.is_distinct());

            let effective = accounts.get_select_params(SelectParams::new().with_distinct(false));
            assert!(!effective.is_distinct());
            Ok(())
        },
        cleanup,
    )
}
