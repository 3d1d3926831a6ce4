//! Coarse server status derived from the compute `vm_state`/`task_state` pair.
//!
//! The table mirrors the public compute API: each VM state has a default
//! status, and a handful of in-flight task states override it. The function
//! is total: an unknown VM state yields `UNKNOWN` and an unknown task state
//! falls back to the VM state's default.

/// Status reported when the VM state is not part of the table.
pub const UNKNOWN_STATUS: &str = "UNKNOWN";

const REBOOT_TASKS: [&str; 3] = ["rebooting", "reboot_pending", "reboot_started"];
const HARD_REBOOT_TASKS: [&str; 3] = [
    "rebooting_hard",
    "reboot_pending_hard",
    "reboot_started_hard",
];
const REBUILD_TASKS: [&str; 3] = [
    "rebuilding",
    "rebuild_block_device_mapping",
    "rebuild_spawning",
];
const RESIZE_TASKS: [&str; 4] = [
    "resize_prep",
    "resize_migrating",
    "resize_migrated",
    "resize_finish",
];

/// Derive the API status string for a VM state and optional task state.
///
/// # Examples
/// ```
/// use instance_sync::domain::status_from_state;
///
/// assert_eq!(status_from_state(Some("active"), None), "ACTIVE");
/// assert_eq!(status_from_state(Some("active"), Some("rebooting")), "REBOOT");
/// assert_eq!(status_from_state(Some("stopped"), Some("powering-on")), "SHUTOFF");
/// assert_eq!(status_from_state(None, None), "UNKNOWN");
/// ```
pub fn status_from_state(vm_state: Option<&str>, task_state: Option<&str>) -> &'static str {
    let Some(vm_state) = vm_state else {
        return UNKNOWN_STATUS;
    };
    let task = task_state.unwrap_or_default();

    match vm_state {
        "active" => active_status(task),
        "building" => "BUILD",
        "stopped" => {
            if RESIZE_TASKS.contains(&task) {
                "RESIZE"
            } else if REBUILD_TASKS.contains(&task) {
                "REBUILD"
            } else {
                "SHUTOFF"
            }
        }
        "resized" => {
            if task == "resize_reverting" {
                "REVERT_RESIZE"
            } else {
                "VERIFY_RESIZE"
            }
        }
        "paused" => {
            if task == "migrating" {
                "MIGRATING"
            } else {
                "PAUSED"
            }
        }
        "suspended" => "SUSPENDED",
        "rescued" => "RESCUE",
        "error" => {
            if REBUILD_TASKS.contains(&task) {
                "REBUILD"
            } else {
                "ERROR"
            }
        }
        "deleted" => "DELETED",
        "soft-delete" => "SOFT_DELETED",
        "shelved" => "SHELVED",
        "shelved_offloaded" => "SHELVED_OFFLOADED",
        _ => UNKNOWN_STATUS,
    }
}

fn active_status(task: &str) -> &'static str {
    if REBOOT_TASKS.contains(&task) {
        "REBOOT"
    } else if HARD_REBOOT_TASKS.contains(&task) {
        "HARD_REBOOT"
    } else if task == "updating_password" {
        "PASSWORD"
    } else if REBUILD_TASKS.contains(&task) {
        "REBUILD"
    } else if task == "migrating" {
        "MIGRATING"
    } else if RESIZE_TASKS.contains(&task) {
        "RESIZE"
    } else {
        "ACTIVE"
    }
}
