//! Check command implementation.

use std::fmt::Write as _;

use anyhow::Result;
use clap::Args;

use patchwork_core::{Compiled, MappingRules, Scope};

use super::ConfigArgs;

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Runs the check command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or compiled.
pub fn run(args: &CheckArgs) -> Result<()> {
    let compiled = args.config.compile()?;
    print!("{}", render(&compiled));
    Ok(())
}

fn render(compiled: &Compiled) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Patchwork Configuration Check");
    let _ = writeln!(out, "=============================");

    for diagnostic in &compiled.diagnostics {
        let _ = writeln!(out, "⚠ {diagnostic}");
    }

    render_scope(&mut out, &Scope::Instance, compiled.rules.instance());
    for (host, rules) in compiled.rules.vhosts() {
        render_scope(&mut out, &Scope::Vhost(host.clone()), rules);
    }

    let _ = writeln!(out, "\n✓ Configuration is valid");
    out
}

fn render_scope(out: &mut String, scope: &Scope, rules: &MappingRules) {
    let _ = writeln!(out, "\n{scope}:");
    if rules.is_empty() {
        let _ = writeln!(out, "  (none)");
        return;
    }
    for (registry, mounts) in rules.mount_points_by_registry() {
        let _ = writeln!(out, "  {registry}");
        for mount in mounts {
            let source = if mount.source.is_empty() {
                "/"
            } else {
                mount.source.as_str()
            };
            let _ = writeln!(out, "    {} ⇐ {source}", mount.target);
        }
    }
}
