//! Shared helpers for integration tests that need a real PostgreSQL.
//!
//! Each test gets its own database on an embedded cluster, created with
//! `postgres` and populated with the two compute tables the sync reads.

pub mod pg_embed;

use pg_embedded_setup_unpriv::TestCluster;
use postgres::{Client, NoTls};
use uuid::Uuid;

use instance_sync::domain::InstanceRow;

/// Compute tables as the sync expects them; `deleted` is non-zero for
/// soft-deleted rows.
const COMPUTE_SCHEMA: &str = "
    CREATE TABLE instances (
        id SERIAL PRIMARY KEY,
        uuid VARCHAR(36) NOT NULL,
        project_id VARCHAR(255),
        user_id VARCHAR(255),
        hostname VARCHAR(255),
        display_name VARCHAR(255),
        image_ref VARCHAR(255),
        host VARCHAR(255),
        availability_zone VARCHAR(255),
        power_state INTEGER,
        vm_state VARCHAR(255),
        task_state VARCHAR(255),
        created_at TIMESTAMP,
        updated_at TIMESTAMP,
        deleted INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE instance_extra (
        id SERIAL PRIMARY KEY,
        instance_uuid VARCHAR(36) NOT NULL,
        flavor TEXT,
        deleted INTEGER NOT NULL DEFAULT 0
    );
";

/// Render a `postgres` error with its SQLSTATE and message when available.
pub fn format_postgres_error(error: &postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };
    let mut summary = format!(
        "postgres error {:?}: {}",
        db_error.code(),
        db_error.message()
    );
    if let Some(detail) = db_error.detail() {
        summary.push_str("; detail: ");
        summary.push_str(detail);
    }
    summary
}

/// Returns true when `SKIP_TEST_CLUSTER` is "1", "true" or "yes".
pub fn should_skip_test_cluster() -> bool {
    std::env::var("SKIP_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Skip with a marker when `SKIP_TEST_CLUSTER` is set, otherwise fail loudly.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_test_cluster() {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        None
    } else {
        panic!("Test cluster setup failed: {reason}. Set SKIP_TEST_CLUSTER=1 to skip.");
    }
}

/// Create a fresh database holding the compute schema and return its URL.
pub fn create_compute_database(cluster: &TestCluster) -> Result<String, String> {
    let name = format!("instance_sync_{}", Uuid::new_v4().simple());
    let admin_url = cluster.connection().database_url("postgres");
    let mut admin = Client::connect(&admin_url, NoTls).map_err(|err| format_postgres_error(&err))?;
    admin
        .batch_execute(&format!("CREATE DATABASE {name}"))
        .map_err(|err| format_postgres_error(&err))?;

    let url = cluster.connection().database_url(&name);
    let mut client = Client::connect(&url, NoTls).map_err(|err| format_postgres_error(&err))?;
    client
        .batch_execute(COMPUTE_SCHEMA)
        .map_err(|err| format_postgres_error(&err))?;
    Ok(url)
}

/// Insert `row` into `instances` with the given `deleted` marker.
pub fn insert_instance(client: &mut Client, row: &InstanceRow, deleted: i32) -> Result<(), String> {
    let created_at = row
        .created_at
        .map(|at| at.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string());
    let updated_at = row
        .updated_at
        .map(|at| at.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string());
    client
        .execute(
            "INSERT INTO instances (
                uuid, project_id, user_id, hostname, display_name, image_ref, host,
                availability_zone, power_state, vm_state, task_state, created_at,
                updated_at, deleted
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12::text::timestamp, $13::text::timestamp, $14
            )",
            &[
                &row.uuid,
                &row.project_id,
                &row.user_id,
                &row.hostname,
                &row.display_name,
                &row.image_ref,
                &row.host,
                &row.availability_zone,
                &row.power_state,
                &row.vm_state,
                &row.task_state,
                &created_at,
                &updated_at,
                &deleted,
            ],
        )
        .map_err(|err| format_postgres_error(&err))?;
    Ok(())
}

/// Insert the `instance_extra` row carrying `row.flavor`.
pub fn insert_extra(client: &mut Client, row: &InstanceRow, deleted: i32) -> Result<(), String> {
    client
        .execute(
            "INSERT INTO instance_extra (instance_uuid, flavor, deleted) VALUES ($1, $2, $3)",
            &[&row.uuid, &row.flavor, &deleted],
        )
        .map_err(|err| format_postgres_error(&err))?;
    Ok(())
}
