use relata::common::Value;
use relata::errors::RelataResult;
use relata::query::SelectParams;
use relata::repository::{HookOptions, SaveOptions};
use relata_int_test::test_util::{cleanup, create_test_context, save_team};

fn main() -> RelataResult<()> {
    println!("Starting stress test...");
    let ctx = create_test_context()?;

    let count = 10_000;
    let team = save_team(&ctx, "stress")?;
    let contacts = ctx.repository("Contact")?;

    let start = std::time::Instant::now();
    for _ in 0..count {
        let mut contact = contacts.get_new()?;
        contact.set("name", uuid::Uuid::new_v4().to_string());
        contact.set("processed", false);
        contacts.save(&mut contact, &SaveOptions::new())?;
        contacts.relate(&contact, "teams", &team, Value::Null, &HookOptions::new())?;
    }
    let elapsed = start.elapsed();
    println!("Inserted and related {} contacts in {:?}", count, elapsed);

    let start = std::time::Instant::now();
    let mut contacts = ctx.repository("Contact")?;
    let mut processed = 0;
    for contact in contacts.where_eq("processed", false).sth().find(SelectParams::new())? {
        let mut contact = contact?;
        contact.set("processed", true);
        contacts.save(&mut contact, &SaveOptions::new())?;
        processed += 1;
    }
    println!("Processed {} contacts in {:?}", processed, start.elapsed());

    let start = std::time::Instant::now();
    let teams = ctx.repository("Team")?;
    let related = teams.count_related(&team, "contacts", SelectParams::new())?;
    println!("Counted {} related contacts in {:?}", related, start.elapsed());

    cleanup(ctx)
}
