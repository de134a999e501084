pub mod sim_bus;

use qif_common::board_config::BoardConfig;
use qif_node::Registry;

/// Path of the installation's board database
pub const BOARDS_TOML: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../config/boards.toml");

/// Load the installation's registry
pub fn installed_registry() -> Registry {
    let config = BoardConfig::load(BOARDS_TOML).unwrap();
    Registry::new(config.records().unwrap()).unwrap()
}
