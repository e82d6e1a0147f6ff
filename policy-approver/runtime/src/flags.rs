use anyhow::Result;
use clap::{ArgMatches, Command};

/// Lets a plugin contribute command-line flags.
///
/// Every registrar augments the command before arguments are parsed and
/// receives the parsed matches afterwards, before any plugin is used.
pub trait FlagRegistrar: Send + Sync {
    fn augment(&self, cmd: Command) -> Command;

    fn configure(&self, matches: &ArgMatches) -> Result<()>;
}

pub(crate) fn augment(mut cmd: Command, registrars: &[&dyn FlagRegistrar]) -> Command {
    for registrar in registrars {
        cmd = registrar.augment(cmd);
    }
    cmd
}

pub(crate) fn configure(matches: &ArgMatches, registrars: &[&dyn FlagRegistrar]) -> Result<()> {
    for registrar in registrars {
        registrar.configure(matches)?;
    }
    Ok(())
}
