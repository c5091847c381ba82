use relata::common::Value;
use relata::entity::Entity;
use relata::mapper::MapperOperation;
use relata::repository::{Foreign, HookOptions};
use relata_int_test::test_util::{
    cleanup, create_test_context, run_test, save_account, save_contact, save_new, save_team,
};

#[test]
fn test_belongs_to_loads_local_key() {
    run_test(
        create_test_context,
        |ctx| {
            let acme = save_account(&ctx, "Acme", 1)?;
            let globex = save_account(&ctx, "Globex", 1)?;
            let contact = save_contact(&ctx, "Jane")?;
            let contacts = ctx.repository("Contact")?;
            assert!(contacts.relate(&contact, "account", &acme, Value::Null, &HookOptions::new())?);

            // the in-memory contact does not carry the key; it is read from the store
            assert!(!contact.has("accountId"));
            assert!(contacts.is_related(&contact, "account", &acme)?);
            assert!(contacts.is_related(&contact, "account", acme.id().unwrap_or_default())?);
            assert!(!contacts.is_related(&contact, "account", &globex)?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_belongs_to_reloads_null_key() {
    run_test(
        create_test_context,
        |ctx| {
            let acme = save_account(&ctx, "Acme", 1)?;
            let contact = save_new(
                &ctx,
                "Contact",
                &[("name", Value::from("Jane")), ("accountId", Value::Null)],
            )?;
            let contacts = ctx.repository("Contact")?;
            assert!(contacts.relate(&contact, "account", &acme, Value::Null, &HookOptions::new())?);

            assert!(contact.has("accountId"));
            assert_eq!(contact.get("accountId"), Value::Null);
            let stored = ctx
                .mapper()
                .stored("Contact", contact.id().unwrap_or_default())
                .expect("stored contact");
            assert_eq!(stored.get("accountId").as_str(), acme.id());

            assert!(contacts.is_related(&contact, "account", &acme)?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_belongs_to_uses_carried_key() {
    run_test(
        create_test_context,
        |ctx| {
            let acme = save_account(&ctx, "Acme", 1)?;
            let mut contact = save_contact(&ctx, "Jane")?;
            contact.set("accountId", acme.id().unwrap_or_default());
            let contacts = ctx.repository("Contact")?;
            ctx.mapper().clear_journal();

            assert!(contacts.is_related(&contact, "account", &acme)?);
            // only the foreign record was looked up
            let selects = ctx.mapper().calls(MapperOperation::Select);
            assert_eq!(selects.len(), 1);
            assert_eq!(selects[0].entity_type, "Account");
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_belongs_to_deleted_foreign_record() {
    run_test(
        create_test_context,
        |ctx| {
            let mut acme = save_account(&ctx, "Acme", 1)?;
            let contact = save_contact(&ctx, "Jane")?;
            let contacts = ctx.repository("Contact")?;
            contacts.relate(&contact, "account", &acme, Value::Null, &HookOptions::new())?;
            assert!(contacts.is_related(&contact, "account", &acme)?);

            ctx.repository("Account")?
                .remove(&mut acme, &HookOptions::new())?;

            // the key still points at the record, but it is gone
            let stored = ctx
                .mapper()
                .stored("Contact", contact.id().unwrap_or_default())
                .expect("stored contact");
            assert_eq!(stored.get("accountId").as_str(), acme.id());
            assert!(!contacts.is_related(&contact, "account", &acme)?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_belongs_to_without_key() {
    run_test(
        create_test_context,
        |ctx| {
            let acme = save_account(&ctx, "Acme", 1)?;
            let contact = save_contact(&ctx, "Jane")?;
            let contacts = ctx.repository("Contact")?;

            assert!(!contacts.is_related(&contact, "account", &acme)?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_to_many_relations_count_the_foreign_record() {
    run_test(
        create_test_context,
        |ctx| {
            let account = save_account(&ctx, "Acme", 1)?;
            let jane = save_contact(&ctx, "Jane")?;
            let john = save_contact(&ctx, "John")?;
            let core = save_team(&ctx, "Core")?;

            let accounts = ctx.repository("Account")?;
            accounts.relate(&account, "contacts", &jane, Value::Null, &HookOptions::new())?;
            assert!(accounts.is_related(&account, "contacts", &jane)?);
            assert!(!accounts.is_related(&account, "contacts", &john)?);

            let teams = ctx.repository("Team")?;
            teams.relate(&core, "contacts", &john, Value::Null, &HookOptions::new())?;
            assert!(teams.is_related(&core, "contacts", &john)?);
            assert!(!teams.is_related(&core, "contacts", &jane)?);

            let counts = ctx.mapper().calls(MapperOperation::CountRelated);
            assert_eq!(counts.len(), 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unsupported_references() {
    run_test(
        create_test_context,
        |ctx| {
            let account = save_account(&ctx, "Acme", 1)?;
            let accounts = ctx.repository("Account")?;
            ctx.mapper().clear_journal();

            assert!(!accounts.is_related(&account, "contacts", Foreign::All)?);
            assert!(!accounts.is_related(&account, "contacts", "")?);
            assert!(!accounts.is_related(&account, "contacts", &Entity::new("Contact"))?);
            assert!(!accounts.is_related(&Entity::new("Account"), "contacts", "c1")?);
            assert!(!accounts.is_related(&account, "partners", "c1")?);
            assert!(ctx.mapper().journal().is_empty());
            Ok(())
        },
        cleanup,
    )
}
