use relata::clause;
use relata::common::{SortOrder, Value};
use relata::entity::Entity;
use relata::errors::ErrorKind;
use relata::mapper::{CollectionMode, MapperOperation};
use relata::query::SelectParams;
use relata::repository::RepositoryHooks;
use relata_int_test::test_util::{
    cleanup, create_test_context, names, run_test, save_account, RecordingHooks, TestContext,
};
use relata::errors::RelataResult;

fn seed_accounts(ctx: &TestContext) -> RelataResult<()> {
    save_account(ctx, "Acme", 5)?;
    save_account(ctx, "Globex", 3)?;
    save_account(ctx, "Initech", 4)?;
    save_account(ctx, "Umbrella", 1)?;
    Ok(())
}

#[test]
fn test_find_with_accumulated_state() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;

            let found = accounts
                .where_clause(clause! { "rating>=" => 3 })
                .order("name", SortOrder::Descending)
                .find(SelectParams::new())?
                .to_vec()?;

            assert_eq!(names(&found), vec!["Initech", "Globex", "Acme"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_where_eq_appends_groups() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;

            let found = accounts
                .where_eq("rating>", 1)
                .where_eq("rating<", 5)
                .where_eq("industry", Value::Null)
                .order("rating", SortOrder::Ascending)
                .find(SelectParams::new())?
                .to_vec()?;
            assert_eq!(names(&found), vec!["Globex", "Initech"]);

            let params = ctx.mapper().calls(MapperOperation::Select)[0]
                .params
                .clone()
                .expect("select params");
            // the null condition was ignored
            assert_eq!(params.get_where_clause().map(|w| w.len()), Some(2));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_where_clause_supplied_keys_win() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;

            let found = accounts
                .where_clause(clause! { "name" => "Acme" })
                .where_clause(clause! { "name" => "Globex" })
                .find(SelectParams::new())?
                .to_vec()?;
            assert_eq!(names(&found), vec!["Globex"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_resets_state() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;

            accounts
                .where_eq("name", "Acme")
                .join("contacts")
                .limit(0, 1)
                .distinct();
            assert!(!accounts.query_state().is_empty());

            let found = accounts.find(SelectParams::new())?.to_vec()?;
            assert_eq!(found.len(), 1);
            assert!(accounts.query_state().is_empty());
            assert!(accounts.query_state().where_clause().is_empty());
            assert!(accounts.query_state().having_clause().is_empty());
            assert!(accounts.list_params().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_resets_state_on_failure() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;

            ctx.mapper().fail_next(MapperOperation::Select);
            let err = accounts
                .where_eq("name", "Acme")
                .having_eq("rating>", 1)
                .find(SelectParams::new())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::StorageError);
            assert!(accounts.query_state().is_empty());

            ctx.mapper().fail_next(MapperOperation::Count);
            assert!(accounts.where_eq("name", "Acme").count(SelectParams::new()).is_err());
            assert!(accounts.query_state().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_repeated_find_yields_identical_results() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;
            let params = SelectParams::new()
                .where_clause(clause! { "rating>" => 2 })
                .order_by("name", SortOrder::Ascending);

            let first = accounts.find(params.clone())?.to_vec()?;
            let second = accounts.find(params)?.to_vec()?;
            assert_eq!(first, second);
            assert_eq!(names(&first), vec!["Acme", "Globex", "Initech"]);

            let calls = ctx.mapper().calls(MapperOperation::Select);
            assert_eq!(calls[0].params, calls[1].params);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_one() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;

            let top = accounts
                .order("rating", SortOrder::Descending)
                .find_one(SelectParams::new())?
                .expect("one account");
            assert_eq!(top.get("name"), Value::from("Acme"));

            let params = ctx.mapper().calls(MapperOperation::Select)[0]
                .params
                .clone()
                .expect("select params");
            assert_eq!(params.get_offset(), Some(0));
            assert_eq!(params.get_limit(), Some(1));

            let none = accounts
                .where_eq("name", "Hooli")
                .find_one(SelectParams::new())?;
            assert!(none.is_none());
            assert!(accounts.query_state().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_streamed_find_is_forward_only() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;

            let mut streamed = accounts
                .sth()
                .order("name", SortOrder::Ascending)
                .find(SelectParams::new())?;
            assert_eq!(streamed.mode(), CollectionMode::Streamed);
            assert!(!streamed.is_restartable());
            assert_eq!(names(&streamed.to_vec()?), vec!["Acme", "Globex", "Initech", "Umbrella"]);
            assert!(streamed.next().is_none());

            let mut materialized = accounts.find(SelectParams::new())?;
            assert_eq!(materialized.mode(), CollectionMode::Materialized);
            assert_eq!(materialized.to_vec()?.len(), 4);
            materialized.reset();
            assert_eq!(materialized.count(), 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_by_query() {
    run_test(
        create_test_context,
        |ctx| {
            let mut row = Entity::new("Account");
            row.set("name", "Raw");
            ctx.mapper()
                .register_query("SELECT * FROM account WHERE name = 'Raw'", vec![row]);

            let mut accounts = ctx.repository("Account")?;
            accounts.where_eq("name", "ignored");
            let found = accounts
                .find_by_query(
                    "SELECT * FROM account WHERE name = 'Raw'",
                    CollectionMode::Streamed,
                )?
                .to_vec()?;

            assert_eq!(names(&found), vec!["Raw"]);
            assert!(accounts.query_state().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_count_and_aggregates_reset_state() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;

            assert_eq!(accounts.count(SelectParams::new())?, 4);
            assert_eq!(
                accounts
                    .where_eq("rating>", 3)
                    .count(SelectParams::new())?,
                2
            );
            assert!(accounts.query_state().is_empty());

            assert_eq!(accounts.where_eq("rating<", 5).max("rating")?, Value::from(4));
            assert!(accounts.query_state().is_empty());
            assert_eq!(accounts.min("rating")?, Value::from(1));
            assert_eq!(accounts.sum("rating")?, Value::from(13));
            assert_eq!(accounts.where_eq("name", "Hooli").max("rating")?, Value::Null);
            assert!(accounts.query_state().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
#[allow(deprecated)]
fn test_get_all_ignores_accumulated_state() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;
            accounts.where_eq("name", "Acme").limit(0, 1);

            let all = accounts.get_all()?.to_vec()?;
            assert_eq!(all.len(), 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_select_params_hook() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            ctx.em().register_hooks(
                "Account",
                RepositoryHooks::new(RecordingHooks::new(ctx.recorder()).with_select_filter("rating>", 3)),
            )?;
            let mut accounts = ctx.repository("Account")?;

            let found = accounts
                .order("name", SortOrder::Ascending)
                .find(SelectParams::new())?
                .to_vec()?;
            assert_eq!(names(&found), vec!["Acme", "Initech"]);
            assert_eq!(accounts.count(SelectParams::new())?, 2);

            let everything = accounts
                .find(SelectParams::new().skip_additional_select_params())?
                .to_vec()?;
            assert_eq!(everything.len(), 4);

            let low = save_account(&ctx, "Hooli", 2)?;
            let hidden = accounts.get_by_id(low.id().unwrap_or_default(), SelectParams::new())?;
            assert!(hidden.is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_projection_and_pagination() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;

            let page = accounts
                .select(&["name"])
                .order_list(vec![("rating", SortOrder::Descending)])
                .limit(1, 2)
                .find(SelectParams::new())?
                .to_vec()?;

            assert_eq!(names(&page), vec!["Initech", "Globex"]);
            assert!(page.iter().all(|e| !e.has("rating")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_set_list_params() {
    run_test(
        create_test_context,
        |ctx| {
            seed_accounts(&ctx)?;
            let mut accounts = ctx.repository("Account")?;

            accounts.set_list_params(
                SelectParams::new()
                    .where_clause(clause! { "name" => "Acme" })
                    .order_by("rating", SortOrder::Ascending)
                    .limit(0, 2),
            );
            assert_eq!(accounts.list_params().get_limit(), Some(2));
            assert!(accounts.list_params().get_where_clause().is_none());

            let found = accounts.find(SelectParams::new())?.to_vec()?;
            assert_eq!(names(&found), vec!["Umbrella", "Globex"]);
            Ok(())
        },
        cleanup,
    )
}
