use ladder_storage::{migrations, MigrationStore};
use rusqlite::{params, Connection, OptionalExtension};

fn open_upgraded() -> MigrationStore {
    let mut store = MigrationStore::open_in_memory().expect("in-memory store must open");
    let registry = migrations::registry().expect("built-in registry must build");
    store
        .upgrade(&registry, None)
        .expect("upgrade to head must succeed on a fresh store");
    store
}

fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |_| Ok(()),
    )
    .optional()
    .expect("sqlite_master lookup must succeed")
    .is_some()
}

#[derive(Debug, PartialEq)]
struct ColumnInfo {
    name: String,
    decl_type: String,
    notnull: bool,
    default: Option<String>,
    pk: bool,
}

fn columns_of(conn: &Connection, table: &str) -> Vec<ColumnInfo> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .expect("table_info must prepare");
    let rows = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                decl_type: row.get(2)?,
                notnull: row.get::<_, i64>(3)? != 0,
                default: row.get(4)?,
                pk: row.get::<_, i64>(5)? != 0,
            })
        })
        .expect("table_info must query");
    rows.map(|row| row.expect("table_info row must decode"))
        .collect()
}

#[test]
fn upgrade_creates_todos_with_exact_schema() {
    let store = open_upgraded();
    let conn = store.connection();

    assert!(table_exists(conn, "todos"));

    let columns = columns_of(conn, "todos");
    assert_eq!(columns.len(), 3, "todos must have exactly three columns");

    assert_eq!(columns[0].name, "id");
    assert_eq!(columns[0].decl_type, "INTEGER");
    assert!(columns[0].pk);
    assert_eq!(columns[0].default, None);

    assert_eq!(columns[1].name, "name");
    assert_eq!(columns[1].decl_type, "TEXT");
    assert!(!columns[1].notnull);
    assert_eq!(columns[1].default, None);
    assert!(!columns[1].pk);

    assert_eq!(columns[2].name, "completed");
    assert_eq!(columns[2].decl_type, "BOOLEAN");
    assert!(columns[2].notnull);
    assert_eq!(columns[2].default.as_deref(), Some("FALSE"));
    assert!(!columns[2].pk);
}

#[test]
fn second_upgrade_fails_with_duplicate_table() {
    let store = open_upgraded();
    let registry = migrations::registry().expect("built-in registry must build");
    let step = registry
        .get(migrations::todos::REVISION)
        .expect("todos step must be registered");

    let err = (step.up)(store.connection()).expect_err("re-running upgrade must fail");
    assert!(
        err.to_string().contains("already exists"),
        "unexpected error: {err}"
    );
}

#[test]
fn downgrade_drops_todos_and_second_downgrade_fails() {
    let mut store = open_upgraded();
    let registry = migrations::registry().expect("built-in registry must build");

    store
        .downgrade_steps(&registry, 1)
        .expect("downgrade after upgrade must succeed");
    assert!(!table_exists(store.connection(), "todos"));

    let step = registry
        .get(migrations::todos::REVISION)
        .expect("todos step must be registered");
    let err = (step.down)(store.connection()).expect_err("downgrade without table must fail");
    assert!(
        err.to_string().contains("no such table"),
        "unexpected error: {err}"
    );
}

#[test]
fn upgrade_then_downgrade_round_trips_table_existence() {
    let mut store = MigrationStore::open_in_memory().expect("in-memory store must open");
    let registry = migrations::registry().expect("built-in registry must build");

    assert!(!table_exists(store.connection(), "todos"));
    store
        .upgrade(&registry, None)
        .expect("upgrade must succeed");
    store
        .downgrade(&registry, None)
        .expect("downgrade to base must succeed");
    assert!(!table_exists(store.connection(), "todos"));
}

#[test]
fn completed_defaults_false_and_name_defaults_null() {
    let store = open_upgraded();
    let conn = store.connection();

    conn.execute("INSERT INTO todos DEFAULT VALUES", [])
        .expect("insert without values must succeed");
    conn.execute("INSERT INTO todos(name) VALUES (?1)", params!["buy milk"])
        .expect("insert with name must succeed");

    let (name, completed) = conn
        .query_row(
            "SELECT name, completed FROM todos WHERE id = 1",
            [],
            |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, bool>(1)?)),
        )
        .expect("first row must load");
    assert_eq!(name, None);
    assert!(!completed);

    let (name, completed) = conn
        .query_row(
            "SELECT name, completed FROM todos WHERE id = 2",
            [],
            |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, bool>(1)?)),
        )
        .expect("second row must load");
    assert_eq!(name.as_deref(), Some("buy milk"));
    assert!(!completed);
}

#[test]
fn id_is_assigned_in_increasing_order() {
    let store = open_upgraded();
    let conn = store.connection();

    for _ in 0..3 {
        conn.execute("INSERT INTO todos DEFAULT VALUES", [])
            .expect("insert must succeed");
    }
    let ids: Vec<i64> = conn
        .prepare("SELECT id FROM todos ORDER BY id")
        .expect("select must prepare")
        .query_map([], |row| row.get(0))
        .expect("select must run")
        .map(|row| row.expect("id must decode"))
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}
