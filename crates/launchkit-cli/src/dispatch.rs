use anyhow::Result;

use crate::command_flows::{
    build_env, run_add_source, run_install, run_list, run_local, run_refresh, run_remove,
    run_remove_source, run_sources, run_startup, run_token_set, run_token_show, run_update_check,
    run_upgrade,
};
use crate::completion::print_completion_script;
use crate::{Cli, Commands, TokenCommands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    if let Commands::Completion { shell } = &cli.command {
        print_completion_script(*shell);
        return Ok(());
    }

    let assume_yes = cli.assume_yes;
    let env = build_env(cli.root, cli.plain)?;

    match cli.command {
        Commands::Sources => run_sources(&env),
        Commands::AddSource { url, name } => run_add_source(&env, &url, name),
        Commands::RemoveSource { name } => run_remove_source(&env, &name),
        Commands::List => run_list(&env),
        Commands::Local => run_local(&env),
        Commands::Refresh => run_refresh(&env),
        Commands::Install { spec } => run_install(&env, &spec),
        Commands::Upgrade { spec } => run_upgrade(&env, &spec),
        Commands::Remove { spec } => run_remove(&env, &spec),
        Commands::Startup => run_startup(&env, assume_yes),
        Commands::UpdateCheck => run_update_check(&env, assume_yes),
        Commands::Token { command } => match command {
            TokenCommands::Show => run_token_show(&env),
            TokenCommands::Set { value } => run_token_set(&env, &value),
        },
        Commands::Completion { .. } => unreachable!("handled before the environment is built"),
    }
}
