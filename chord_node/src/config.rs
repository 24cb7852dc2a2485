use std::time::Duration;

/// Every enumerated knob from the spec's configuration section, loaded
/// once from CLI flags and passed by value (it's cheap and `Clone`) to
/// every component that needs it. No global/lazy-static config object.
#[derive(Clone, Debug)]
pub struct ChordConfig {
    pub replication_factor: usize,
    pub stabilize_interval: Duration,
    pub fix_fingers_interval: Duration,
    pub check_predecessor_interval: Duration,
    pub ping_interval: Duration,
    pub failure_threshold: u32,
    pub ping_timeout: Duration,
    pub net_timeout: Duration,
    pub max_retries: u32,
    pub encryption_enabled: bool,
    pub signature_enabled: bool,
    pub secret_key: String,
}

impl Default for ChordConfig {
    fn default() -> Self {
        ChordConfig {
            replication_factor: 3,
            stabilize_interval: Duration::from_secs(2),
            fix_fingers_interval: Duration::from_secs(2),
            check_predecessor_interval: Duration::from_secs(2),
            ping_interval: Duration::from_secs(1),
            failure_threshold: 3,
            ping_timeout: Duration::from_secs(1),
            net_timeout: Duration::from_secs(2),
            max_retries: 3,
            encryption_enabled: false,
            signature_enabled: true,
            secret_key: String::new(),
        }
    }
}

pub const FINGER_TABLE_SIZE: u32 = 256;
pub const DEFAULT_PORT: u16 = 5000;
pub const LOCALHOST: [u8; 4] = [127, 0, 0, 1];
pub const LEAVE_EXIT_DELAY: Duration = Duration::from_millis(100);
pub const MAX_LOOKUP_HOPS: u32 = FINGER_TABLE_SIZE * 4;
