use clap::CommandFactory;
use clap_complete::Shell;

use crate::Cli;

pub(crate) fn print_completion_script(shell: Shell) {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "launchkit", &mut std::io::stdout());
}
