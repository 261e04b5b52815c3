//! Named constants shared by the migration workflow.
//!
//! Permission masks and batch sizes live here and nowhere else.

use crate::types::{Address, Bytes32, PermissionMask};

/// Controller permission bits granted to a registered scheme.
pub mod permissions {
    use super::PermissionMask;

    pub const NONE: PermissionMask = PermissionMask(0x0000_0000);
    /// Bit 0: the scheme is registered.
    pub const REGISTERED: PermissionMask = PermissionMask(0x0000_0001);
    /// Bit 1: may register or unregister other schemes.
    pub const REGISTER_SCHEMES: PermissionMask = PermissionMask(0x0000_0002);
    /// Bit 2: may add or remove global constraints.
    pub const GLOBAL_CONSTRAINTS: PermissionMask = PermissionMask(0x0000_0004);
    /// Bit 3: may upgrade the controller.
    pub const UPGRADE_CONTROLLER: PermissionMask = PermissionMask(0x0000_0008);
    /// Bit 4: may make generic calls on behalf of the avatar.
    pub const GENERIC_CALL: PermissionMask = PermissionMask(0x0000_0010);
    /// Upgrade scheme: register schemes + upgrade controller.
    pub const UPGRADE: PermissionMask = PermissionMask(0x0000_000A);
    pub const ALL: PermissionMask = PermissionMask(0x0000_001F);
}

/// Founders passed to the instance-creation call.
pub const DEFAULT_INITIAL_FOUNDERS_BATCH: usize = 20;

/// Founders per subsequent `addFounders` call.
pub const DEFAULT_FOUNDERS_BATCH: usize = 100;

/// Longest module name the factory accepts; names travel as `bytes32`.
pub const MAX_MODULE_NAME_BYTES: usize = 32;

/// Voting parameter set used when a module does not name one.
pub const DEFAULT_VOTING_PARAMS_INDEX: usize = 0;

pub const ZERO_ADDRESS: Address = Address::ZERO;
pub const ZERO_HASH: Bytes32 = Bytes32::ZERO;

/// Logical name of the fungible base token in the package record.
pub const BASE_TOKEN_NAME: &str = "GEN";

/// Metadata string attached to the batched scheme installation.
pub const DEFAULT_SCHEMES_METADATA: &str = "metaData";

pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 750;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
