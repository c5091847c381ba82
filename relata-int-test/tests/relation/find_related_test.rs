use relata::clause;
use relata::common::{SortOrder, Value};
use relata::entity::Entity;
use relata::mapper::{MapperOperation, Related};
use relata::query::SelectParams;
use relata::repository::{HookOptions, RepositoryHooks};
use relata_int_test::test_util::{
    cleanup, create_test_context, names, run_test, save_account, save_contact, save_new,
    save_team, RecordingHooks,
};

#[test]
fn test_without_id() {
    run_test(
        create_test_context,
        |ctx| {
            let accounts = ctx.repository("Account")?;
            let unsaved = Entity::new("Account");

            assert!(accounts.find_related(&unsaved, "contacts", SelectParams::new())?.is_none());
            assert_eq!(accounts.count_related(&unsaved, "contacts", SelectParams::new())?, 0);
            assert!(ctx.mapper().journal().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unknown_relation() {
    run_test(
        create_test_context,
        |ctx| {
            let account = save_account(&ctx, "Acme", 1)?;
            let accounts = ctx.repository("Account")?;

            assert!(accounts.find_related(&account, "partners", SelectParams::new())?.is_none());
            assert_eq!(accounts.count_related(&account, "partners", SelectParams::new())?, 0);
            assert_eq!(ctx.mapper().call_count(MapperOperation::SelectRelated), 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_has_many() {
    run_test(
        create_test_context,
        |ctx| {
            let account = save_account(&ctx, "Acme", 1)?;
            let accounts = ctx.repository("Account")?;
            for name in ["Jane", "John", "Ann"] {
                let contact = save_contact(&ctx, name)?;
                accounts.relate(&account, "contacts", &contact, Value::Null, &HookOptions::new())?;
            }
            save_contact(&ctx, "Unrelated")?;

            let related = accounts
                .find_related(
                    &account,
                    "contacts",
                    SelectParams::new().order_by("name", SortOrder::Ascending),
                )?
                .expect("related contacts");
            let contacts = related.into_collection().to_vec()?;
            assert_eq!(names(&contacts), vec!["Ann", "Jane", "John"]);

            let count = accounts.count_related(
                &account,
                "contacts",
                SelectParams::new().where_clause(clause! { "name*" => "J%" }),
            )?;
            assert_eq!(count, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_belongs_to() {
    run_test(
        create_test_context,
        |ctx| {
            let account = save_account(&ctx, "Acme", 1)?;
            let jane = save_contact(&ctx, "Jane")?;
            let john = save_contact(&ctx, "John")?;
            let contacts = ctx.repository("Contact")?;
            contacts.relate(&jane, "account", &account, Value::Null, &HookOptions::new())?;

            let related = contacts
                .find_related(&jane, "account", SelectParams::new())?
                .expect("related account");
            assert!(matches!(related, Related::One(Some(_))));
            assert_eq!(related.into_entity().and_then(|a| a.id().map(String::from)).as_deref(), account.id());
            assert_eq!(contacts.count_related(&jane, "account", SelectParams::new())?, 1);

            let related = contacts
                .find_related(&john, "account", SelectParams::new())?
                .expect("empty relation");
            assert!(related.into_entity().is_none());
            assert_eq!(contacts.count_related(&john, "account", SelectParams::new())?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_belongs_to_parent_type_resolved_from_store() {
    run_test(
        create_test_context,
        |ctx| {
            let account = save_account(&ctx, "Acme", 1)?;
            let note = save_new(&ctx, "Note", &[("text", Value::from("call back"))])?;
            let notes = ctx.repository("Note")?;
            assert!(notes.relate(&note, "parent", &account, Value::Null, &HookOptions::new())?);

            // the in-memory note does not know its parent type; the stored row does
            assert!(!note.has("parentType"));
            let parent = notes
                .find_related(&note, "parent", SelectParams::new())?
                .and_then(Related::into_entity)
                .expect("parent account");
            assert_eq!(parent.id(), account.id());
            assert_eq!(notes.count_related(&note, "parent", SelectParams::new())?, 1);
            assert_eq!(ctx.mapper().call_count(MapperOperation::SelectRelated), 1);
            assert_eq!(ctx.mapper().call_count(MapperOperation::CountRelated), 1);

            let loaded = notes
                .get_by_id(note.id().unwrap_or_default(), SelectParams::new())?
                .expect("stored note");
            assert_eq!(loaded.get("parentType"), Value::from("Account"));
            let parent = notes
                .find_related(&loaded, "parent", SelectParams::new())?
                .and_then(Related::into_entity)
                .expect("parent account");
            assert_eq!(parent.entity_type(), "Account");
            assert_eq!(parent.get("name"), Value::from("Acme"));
            assert_eq!(notes.count_related(&loaded, "parent", SelectParams::new())?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_many_many_applies_target_hook() {
    run_test(
        create_test_context,
        |ctx| {
            let contact = save_contact(&ctx, "Jane")?;
            let contacts = ctx.repository("Contact")?;
            for name in ["Core", "Ops", "QA"] {
                let team = save_team(&ctx, name)?;
                contacts.relate(&contact, "teams", &team, Value::Null, &HookOptions::new())?;
            }
            assert_eq!(contacts.count_related(&contact, "teams", SelectParams::new())?, 3);

            ctx.em().register_hooks(
                "Team",
                RepositoryHooks::new(RecordingHooks::new(ctx.recorder()).with_select_filter("name!=", "QA")),
            )?;
            ctx.mapper().clear_journal();

            let teams = contacts
                .find_related(&contact, "teams", SelectParams::new())?
                .expect("related teams")
                .into_collection()
                .to_vec()?;
            assert_eq!(teams.len(), 2);
            assert!(!names(&teams).contains(&"QA".to_string()));
            assert_eq!(contacts.count_related(&contact, "teams", SelectParams::new())?, 2);

            let params = ctx.mapper().calls(MapperOperation::SelectRelated)[0]
                .params
                .clone()
                .expect("select params");
            assert_eq!(params.get_where_clause(), Some(&clause! { "name!=" => "QA" }));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_streamed_related() {
    run_test(
        create_test_context,
        |ctx| {
            let account = save_account(&ctx, "Acme", 1)?;
            let accounts = ctx.repository("Account")?;
            for name in ["Jane", "John"] {
                let contact = save_contact(&ctx, name)?;
                accounts.relate(&account, "contacts", &contact, Value::Null, &HookOptions::new())?;
            }

            let mut related = accounts
                .find_related(&account, "contacts", SelectParams::new().sth())?
                .expect("related contacts")
                .into_collection();
            assert!(!related.is_restartable());
            assert_eq!(related.to_vec()?.len(), 2);
            Ok(())
        },
        cleanup,
    )
}
