#![deny(warnings)]
pub mod belief;
pub mod model;

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "resistance-agent"
    }

    pub const fn codename() -> &'static str {
        "Belief Tracker"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
