//! Version command implementation

use crate::cli::Output;
use anyhow::Result;

/// Execute the version command
pub async fn execute(output: &Output) -> Result<()> {
    let version = crate::VERSION;
    let name = crate::PKG_NAME;
    let description = env!("CARGO_PKG_DESCRIPTION");
    let authors = env!("CARGO_PKG_AUTHORS");

    output.header("🖼  pixbatch Version Information");
    output.key_value("Version:", &format!("{name} v{version}"), true);
    output.key_value("Description:", description, false);
    output.key_value("Authors:", authors, false);

    output.category("Build Information");
    output.key_value("Rust edition:", "2024", false);
    output.key_value("Target:", std::env::consts::ARCH, false);
    output.key_value("Profile:", if cfg!(debug_assertions) { "debug" } else { "release" }, false);
    output.key_value("Logical CPUs:", &num_cpus::get().to_string(), false);
    output.blank_line();

    Ok(())
}
