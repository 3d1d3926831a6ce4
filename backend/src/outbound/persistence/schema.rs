//! Diesel table definitions for the compute database tables the sync reads.
//!
//! Only the columns the sync needs are declared. Soft-deleted rows carry a
//! non-zero `deleted` value.

diesel::table! {
    /// Compute instances owned by the compute-management service.
    instances (id) {
        id -> Integer,
        uuid -> Varchar,
        project_id -> Nullable<Varchar>,
        user_id -> Nullable<Varchar>,
        hostname -> Nullable<Varchar>,
        display_name -> Nullable<Varchar>,
        image_ref -> Nullable<Varchar>,
        host -> Nullable<Varchar>,
        availability_zone -> Nullable<Varchar>,
        power_state -> Nullable<Integer>,
        vm_state -> Nullable<Varchar>,
        task_state -> Nullable<Varchar>,
        created_at -> Nullable<Timestamp>,
        updated_at -> Nullable<Timestamp>,
        deleted -> Integer,
    }
}

diesel::table! {
    /// Per-instance serialised attributes, keyed by instance uuid.
    instance_extra (id) {
        id -> Integer,
        instance_uuid -> Varchar,
        /// Versioned flavor object serialised as JSON text.
        flavor -> Nullable<Text>,
        deleted -> Integer,
    }
}

diesel::allow_tables_to_appear_in_same_query!(instances, instance_extra);
