use parking_lot::Mutex;
use rung_migrate::{
    CodeRegistry, FnMigration, LedgerStore, MemoryLedger, MigrateError, MigrationRequest, Migrator,
};
use std::collections::BTreeSet;

/// Stand-in for a database: the set of tables currently present
#[derive(Default)]
struct Schema {
    tables: Mutex<BTreeSet<String>>,
}

fn table(name: &'static str) -> FnMigration<Schema> {
    FnMigration::new(
        move |schema: &Schema| {
            if !schema.tables.lock().insert(name.to_string()) {
                anyhow::bail!("relation \"{}\" already exists", name);
            }
            Ok(())
        },
        move |schema: &Schema| {
            if !schema.tables.lock().remove(name) {
                anyhow::bail!("relation \"{}\" does not exist", name);
            }
            Ok(())
        },
    )
}

fn tables(migrator: &Migrator<Schema, MemoryLedger>) -> Vec<String> {
    migrator.context().tables.lock().iter().cloned().collect()
}

async fn applied(migrator: &Migrator<Schema, MemoryLedger>) -> Vec<String> {
    migrator.ledger().applied_names().await.unwrap().into_iter().collect()
}

#[tokio::test]
async fn test_apply_then_revert_everything() {
    let registry = CodeRegistry::new()
        .register("002_b", table("b"))
        .register("001_a", table("a"));
    let migrator = Migrator::new(Schema::default(), registry, MemoryLedger::new());

    let plan = migrator.plan(&MigrationRequest::apply(1)).await.unwrap();
    assert_eq!(plan.names(), vec!["001_a"]);
    assert!(migrator.run(&MigrationRequest::apply(1)).await.unwrap());
    assert_eq!(applied(&migrator).await, vec!["001_a"]);

    let plan = migrator.plan(&MigrationRequest::apply(0)).await.unwrap();
    assert_eq!(plan.names(), vec!["002_b"]);
    assert!(migrator.run(&MigrationRequest::apply(0)).await.unwrap());
    assert_eq!(tables(&migrator), vec!["a", "b"]);

    let plan = migrator.plan(&MigrationRequest::revert(0)).await.unwrap();
    assert_eq!(plan.names(), vec!["002_b", "001_a"]);
    assert!(migrator.run(&MigrationRequest::revert(0)).await.unwrap());
    assert!(applied(&migrator).await.is_empty());
    assert!(tables(&migrator).is_empty());

    assert!(!migrator.run(&MigrationRequest::revert(0)).await.unwrap());
}

#[tokio::test]
async fn test_out_of_order_history_is_reverted_in_history_order() {
    let registry = CodeRegistry::new()
        .register("001_a", table("a"))
        .register("002_b", table("b"))
        .register("003_c", table("c"));
    let ledger = MemoryLedger::with_applied(["001_a", "003_c"]);
    let migrator = Migrator::new(Schema::default(), registry, ledger);

    // 002_b landed after 003_c was applied: skipped until explicitly allowed
    assert!(!migrator.run(&MigrationRequest::apply(0)).await.unwrap());
    let request = MigrationRequest::apply(0).allow_out_of_order(true);
    assert!(migrator.run(&request).await.unwrap());

    assert_eq!(
        migrator.ledger().applied_in_order().await.unwrap(),
        vec!["001_a", "003_c", "002_b"]
    );

    let plan = migrator.plan(&MigrationRequest::revert(1)).await.unwrap();
    assert_eq!(plan.names(), vec!["002_b"]);
}

#[tokio::test]
async fn test_fake_run_syncs_ledger_with_existing_schema() {
    let registry = CodeRegistry::new()
        .register("001_a", table("a"))
        .register("002_b", table("b"));
    let migrator = Migrator::new(Schema::default(), registry, MemoryLedger::new());
    migrator.context().tables.lock().insert("a".to_string());

    // the table already exists, so only the ledger must learn about 001_a
    let request = MigrationRequest::apply(1).fake(true);
    assert!(migrator.run(&request).await.unwrap());
    assert_eq!(tables(&migrator), vec!["a"]);

    assert!(migrator.run(&MigrationRequest::apply(0)).await.unwrap());
    assert_eq!(tables(&migrator), vec!["a", "b"]);
    assert_eq!(applied(&migrator).await, vec!["001_a", "002_b"]);
}

#[tokio::test]
async fn test_failed_action_keeps_earlier_steps() {
    let registry = CodeRegistry::new()
        .register("001_a", table("a"))
        .register("002_a_again", table("a"))
        .register("003_c", table("c"));
    let migrator = Migrator::new(Schema::default(), registry, MemoryLedger::new());

    let err = migrator.run(&MigrationRequest::apply(0)).await.unwrap_err();
    assert!(matches!(err, MigrateError::Action { ref name, .. } if name == "002_a_again"));
    assert!(err.to_string().contains("already exists"));

    assert_eq!(applied(&migrator).await, vec!["001_a"]);
    assert_eq!(tables(&migrator), vec!["a"]);
}

#[tokio::test]
async fn test_revert_of_vanished_unit_is_refused_up_front() {
    let registry = CodeRegistry::new().register("001_a", table("a"));
    let ledger = MemoryLedger::with_applied(["001_a", "002_gone"]);
    let migrator = Migrator::new(Schema::default(), registry, ledger);

    let err = migrator.run(&MigrationRequest::revert(0)).await.unwrap_err();
    assert!(matches!(err, MigrateError::UnresolvedUnit { ref name } if name == "002_gone"));
    assert_eq!(applied(&migrator).await, vec!["001_a", "002_gone"]);
}
