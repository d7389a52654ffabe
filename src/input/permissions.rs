//! Android permissions tracked by the permission bit-vector.

use ndarray::Array1;

use crate::config::N_PERMISSIONS;

/// Permission names in bit-vector order.
pub const PERMISSIONS: [&str; N_PERMISSIONS] = [
    "ACCESS_COARSE_LOCATION",
    "ACCESS_FINE_LOCATION",
    "ACCESS_LOCATION_EXTRA_COMMANDS",
    "ACCESS_NETWORK_STATE",
    "ACCESS_WIFI_STATE",
    "BLUETOOTH",
    "BROADCAST_STICKY",
    "CALL_PHONE",
    "CAMERA",
    "CHANGE_CONFIGURATION",
    "CHANGE_NETWORK_STATE",
    "CHANGE_WIFI_STATE",
    "DISABLE_KEYGUARD",
    "GET_ACCOUNTS",
    "GET_TASKS",
    "INSTALL_PACKAGES",
    "INTERACT_ACROSS_USERS_FULL",
    "INTERNET",
    "KILL_BACKGROUND_PROCESSES",
    "MODIFY_AUDIO_SETTINGS",
    "MODIFY_PHONE_STATE",
    "MOUNT_UNMOUNT_FILESYSTEMS",
    "PROCESS_OUTGOING_CALLS",
    "READ_CONTACTS",
    "READ_EXTERNAL_STORAGE",
    "READ_LOGS",
    "READ_PHONE_STATE",
    "READ_SETTINGS",
    "READ_SMS",
    "READ_USER_DICTIONARY",
    "RECEIVE_BOOT_COMPLETED",
    "RECEIVE_MMS",
    "RECEIVE_SMS",
    "RECEIVE_WAP_PUSH",
    "RECORD_AUDIO",
    "RESTART_PACKAGES",
    "SEND_SMS",
    "SET_WALLPAPER",
    "SYSTEM_ALERT_WINDOW",
    "UPDATE_APP_OPS_STATS",
    "USE_CREDENTIALS",
    "VIBRATE",
    "WAKE_LOCK",
    "WRITE_APN_SETTINGS",
    "WRITE_CONTACTS",
    "WRITE_EXTERNAL_STORAGE",
    "WRITE_INTERNAL_STORAGE",
    "WRITE_SECURE_SETTINGS",
    "WRITE_SETTINGS",
    "WRITE_SMS",
];

/// Strip an `android.permission.` style prefix.
fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Bit-vector of the granted permissions: 1.0 where present, else 0.0.
///
/// Accepts bare names (`INTERNET`) and fully qualified ones
/// (`android.permission.INTERNET`). Unknown names are ignored.
pub fn permission_vector<S: AsRef<str>>(granted: &[S]) -> Array1<f32> {
    let mut bits = Array1::zeros(N_PERMISSIONS);
    for name in granted {
        let short = short_name(name.as_ref());
        if let Some(idx) = PERMISSIONS.iter().position(|&p| p == short) {
            bits[idx] = 1.0;
        }
    }
    bits
}
