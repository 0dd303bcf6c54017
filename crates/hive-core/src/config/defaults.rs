// --- Default value functions ---

pub(super) fn default_data_dir() -> String {
    "~/.hive".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_api_host() -> String {
    "127.0.0.1".to_string()
}
pub(super) fn default_api_port() -> u16 {
    3000
}
pub(super) fn default_reconnect_delay_secs() -> u64 {
    5
}
pub(super) fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}
