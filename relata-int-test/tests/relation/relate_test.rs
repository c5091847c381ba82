use indexmap::IndexMap;
use relata::common::Value;
use relata::entity::Entity;
use relata::errors::ErrorKind;
use relata::mapper::MapperOperation;
use relata::query::SelectParams;
use relata::clause;
use relata::repository::{Foreign, HookOptions, RelationOverride};
use relata_int_test::test_util::{
    cleanup, create_test_context, run_test, save_account, save_contact, save_team,
    RecordingOverride,
};

fn role(name: &str) -> Value {
    let mut data = IndexMap::new();
    data.insert("role".to_string(), Value::from(name));
    Value::from(data)
}

#[test]
fn test_relate_without_id_is_refused() {
    run_test(
        create_test_context,
        |ctx| {
            let team = save_team(&ctx, "Core")?;
            let contacts = ctx.repository("Contact")?;
            let unsaved = Entity::new("Contact");
            ctx.mapper().clear_journal();

            let related = contacts.relate(&unsaved, "teams", &team, Value::Null, &HookOptions::new())?;
            assert!(!related);
            assert!(ctx.mapper().journal().is_empty());
            assert!(ctx.recorder().events().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_relate_unknown_relation_is_refused() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let contacts = ctx.repository("Contact")?;
            ctx.mapper().clear_journal();

            assert!(!contacts.relate(&contact, "projects", "p1", Value::Null, &HookOptions::new())?);
            assert!(!contacts.unrelate(&contact, "projects", Foreign::All, &HookOptions::new())?);
            assert!(ctx.mapper().journal().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_relate_by_entity_and_by_id() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let core = save_team(&ctx, "Core")?;
            let ops = save_team(&ctx, "Ops")?;
            let contacts = ctx.repository("Contact")?;

            assert!(contacts.relate(&contact, "teams", &core, role("lead"), &HookOptions::new())?);
            assert_eq!(ctx.mapper().call_count(MapperOperation::Relate), 1);

            let ops_id = ops.id().unwrap_or_default().to_string();
            assert!(contacts.relate(&contact, "teams", &ops_id, Value::Null, &HookOptions::new())?);
            assert_eq!(ctx.mapper().call_count(MapperOperation::AddRelation), 1);

            assert_eq!(
                contacts.get_relation_column(&contact, "teams", core.id().unwrap_or_default(), "role")?,
                Value::from("lead")
            );
            assert_eq!(
                contacts.get_relation_column(&contact, "teams", &ops_id, "role")?,
                Value::Null
            );
            assert_eq!(contacts.count_related(&contact, "teams", SelectParams::new())?, 2);
            assert_eq!(
                ctx.recorder().events(),
                vec![
                    "before_relate:Contact.teams",
                    "after_relate:Contact.teams",
                    "before_relate:Contact.teams",
                    "after_relate:Contact.teams"
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_relate_rejects_non_map_data() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let team = save_team(&ctx, "Core")?;
            let contacts = ctx.repository("Contact")?;

            let err = contacts
                .relate(&contact, "teams", &team, Value::from("lead"), &HookOptions::new())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidDataType);
            assert_eq!(ctx.mapper().call_count(MapperOperation::Relate), 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_relate_all_is_refused() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let contacts = ctx.repository("Contact")?;

            assert!(!contacts.relate(&contact, "teams", Foreign::All, Value::Null, &HookOptions::new())?);
            assert!(ctx.recorder().events().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_after_hook_needs_success() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let contacts = ctx.repository("Contact")?;

            // the team does not exist, so the store reports no link
            let related =
                contacts.relate(&contact, "teams", "missing", Value::Null, &HookOptions::new())?;
            assert!(!related);
            assert_eq!(ctx.recorder().events(), vec!["before_relate:Contact.teams"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_before_hook_failure_aborts_relate() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let team = save_team(&ctx, "Core")?;
            let contacts = ctx.repository("Contact")?;

            ctx.recorder().fail_on("before_relate:Contact.teams");
            let err = contacts
                .relate(&contact, "teams", &team, Value::Null, &HookOptions::new())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::HookError);
            assert_eq!(ctx.mapper().call_count(MapperOperation::Relate), 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_override_hooks_run_after_generic_hooks() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.em().register_relation_override(
                "Contact",
                "teams",
                RelationOverride::new(RecordingOverride::hooks_only(ctx.recorder())),
            )?;
            let contact = save_contact(&ctx, "Jane")?;
            let team = save_team(&ctx, "Core")?;
            let contacts = ctx.repository("Contact")?;

            assert!(contacts.relate(&contact, "teams", &team, Value::Null, &HookOptions::new())?);
            assert_eq!(ctx.mapper().call_count(MapperOperation::Relate), 1);
            assert_eq!(
                ctx.recorder().events(),
                vec![
                    "before_relate:Contact.teams",
                    "override.before_relate",
                    "after_relate:Contact.teams",
                    "override.after_relate"
                ]
            );

            ctx.recorder().clear();
            assert!(contacts.unrelate(&contact, "teams", &team, &HookOptions::new())?);
            assert_eq!(
                ctx.recorder().events(),
                vec![
                    "before_unrelate:Contact.teams",
                    "override.before_unrelate",
                    "after_unrelate:Contact.teams",
                    "override.after_unrelate"
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_override_operation_replaces_mapper_dispatch() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.em().register_relation_override(
                "Contact",
                "teams",
                RelationOverride::new(RecordingOverride::with_operations(ctx.recorder())),
            )?;
            let contact = save_contact(&ctx, "Jane")?;
            let contacts = ctx.repository("Contact")?;

            assert!(contacts.relate(&contact, "teams", "t1", Value::Null, &HookOptions::new())?);
            assert!(contacts.unrelate(&contact, "teams", "t1", &HookOptions::new())?);

            assert_eq!(ctx.mapper().call_count(MapperOperation::AddRelation), 0);
            assert_eq!(ctx.mapper().call_count(MapperOperation::RemoveRelation), 0);
            assert_eq!(ctx.recorder().count("override.relate"), 1);
            assert_eq!(ctx.recorder().count("override.unrelate"), 1);
            assert_eq!(ctx.recorder().count("after_relate:Contact.teams"), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_override_of_other_relation_is_not_used() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.em().register_relation_override(
                "Team",
                "contacts",
                RelationOverride::new(RecordingOverride::with_operations(ctx.recorder())),
            )?;
            let contact = save_contact(&ctx, "Jane")?;
            let team = save_team(&ctx, "Core")?;

            let contacts = ctx.repository("Contact")?;
            assert!(contacts.relate(&contact, "teams", &team, Value::Null, &HookOptions::new())?);
            assert_eq!(ctx.mapper().call_count(MapperOperation::Relate), 1);
            assert_eq!(ctx.recorder().count("override.relate"), 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unrelate_one_and_all() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let core = save_team(&ctx, "Core")?;
            let ops = save_team(&ctx, "Ops")?;
            let qa = save_team(&ctx, "QA")?;
            let contacts = ctx.repository("Contact")?;
            for team in [&core, &ops, &qa] {
                contacts.relate(&contact, "teams", team, Value::Null, &HookOptions::new())?;
            }
            ctx.recorder().clear();

            let core_id = core.id().unwrap_or_default();
            assert!(contacts.unrelate(&contact, "teams", core_id, &HookOptions::new())?);
            assert_eq!(ctx.mapper().call_count(MapperOperation::RemoveRelation), 1);
            assert_eq!(contacts.count_related(&contact, "teams", SelectParams::new())?, 2);

            // already unlinked
            assert!(!contacts.unrelate(&contact, "teams", core_id, &HookOptions::new())?);

            ctx.recorder().clear();
            assert!(contacts.unrelate(&contact, "teams", Foreign::All, &HookOptions::new())?);
            assert_eq!(ctx.mapper().call_count(MapperOperation::RemoveAllRelations), 1);
            assert_eq!(ctx.recorder().count("after_unrelate:Contact.teams"), 1);
            assert_eq!(contacts.count_related(&contact, "teams", SelectParams::new())?, 0);
            assert!(ctx.mapper().pivot_rows("team_contact").is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_has_many_relate_sets_foreign_key() {
    run_test(
        create_test_context,
        |ctx| {
            let account = save_account(&ctx, "Acme", 1)?;
            let jane = save_contact(&ctx, "Jane")?;
            let accounts = ctx.repository("Account")?;

            assert!(accounts.relate(&account, "contacts", &jane, Value::Null, &HookOptions::new())?);
            let stored = ctx
                .mapper()
                .stored("Contact", jane.id().unwrap_or_default())
                .expect("stored contact");
            assert_eq!(stored.get("accountId").as_str(), account.id());

            assert!(accounts.unrelate(&account, "contacts", &jane, &HookOptions::new())?);
            let stored = ctx
                .mapper()
                .stored("Contact", jane.id().unwrap_or_default())
                .expect("stored contact");
            assert!(stored.get("accountId").is_null());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_relation() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let team = save_team(&ctx, "Core")?;
            let team_id = team.id().unwrap_or_default();
            let contacts = ctx.repository("Contact")?;
            contacts.relate(&contact, "teams", &team, role("member"), &HookOptions::new())?;
            ctx.recorder().clear();

            assert!(contacts.update_relation(&contact, "teams", &team, role("lead"))?);
            assert_eq!(
                contacts.get_relation_column(&contact, "teams", team_id, "role")?,
                Value::from("lead")
            );

            assert!(contacts.update_relation(&contact, "teams", team_id, role("owner"))?);
            assert_eq!(
                contacts.get_relation_column(&contact, "teams", team_id, "role")?,
                Value::from("owner")
            );

            // not linked
            assert!(!contacts.update_relation(&contact, "teams", "missing", role("lead"))?);
            assert!(!contacts.update_relation(&contact, "teams", Foreign::All, role("lead"))?);
            assert!(ctx.recorder().events().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_pivot_data_limited_to_declared_columns() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let team = save_team(&ctx, "Core")?;
            let contacts = ctx.repository("Contact")?;

            let mut data = IndexMap::new();
            data.insert("role".to_string(), Value::from("lead"));
            data.insert("salary".to_string(), Value::from(100));
            contacts.relate(&contact, "teams", &team, Value::from(data), &HookOptions::new())?;

            let rows = ctx.mapper().pivot_rows("team_contact");
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].get("role"), Some(&Value::from("lead")));
            assert!(rows[0].get("salary").is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_mass_relate() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            save_team(&ctx, "Core")?;
            save_team(&ctx, "Ops")?;
            save_team(&ctx, "QA")?;
            let contacts = ctx.repository("Contact")?;

            let params = SelectParams::new().where_clause(clause! { "name!=" => "QA" });
            assert!(contacts.mass_relate(&contact, "teams", params, &HookOptions::new())?);

            assert_eq!(
                ctx.recorder().events(),
                vec!["before_mass_relate:Contact.teams", "after_mass_relate:Contact.teams"]
            );
            assert_eq!(contacts.count_related(&contact, "teams", SelectParams::new())?, 2);

            let unsaved = Entity::new("Contact");
            assert!(!contacts.mass_relate(&unsaved, "teams", SelectParams::new(), &HookOptions::new())?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_mass_relate_failure_skips_after_hook() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let contacts = ctx.repository("Contact")?;

            ctx.mapper().fail_next(MapperOperation::MassRelate);
            let err = contacts
                .mass_relate(&contact, "teams", SelectParams::new(), &HookOptions::new())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::StorageError);
            assert_eq!(ctx.recorder().events(), vec!["before_mass_relate:Contact.teams"]);
            Ok(())
        },
        cleanup,
    )
}
