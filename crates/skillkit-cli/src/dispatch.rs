use std::io::{self, IsTerminal};

use anyhow::Result;
use skillkit_core::CancelToken;
use tracing::warn;

use crate::completion::write_completions_script;
use crate::flows::{
    format_backups_output, format_install_outcome, install_overrides, install_warning_lines,
    run_backups_command, run_install_command,
};
use crate::prompt::{AssumeYes, Confirmer, TerminalConfirmer};
use crate::render::resolve_output_style;
use crate::settings::{format_settings_lines, load_settings, SettingOverrides};
use crate::signal::spawn_interrupt_listener;
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let output_style = resolve_output_style(io::stdout().is_terminal(), cli.plain);

    match cli.command {
        Commands::Install(args) => {
            let settings = load_settings(cli.config.as_deref(), &install_overrides(&args))?;
            let cancel = CancelToken::new();
            if !args.dry_run {
                if let Err(err) = spawn_interrupt_listener(cancel.clone()) {
                    warn!("Ctrl-C will not roll back cleanly: {err:#}");
                }
            }

            let mut confirmer: Box<dyn Confirmer> = if args.yes {
                Box::new(AssumeYes)
            } else {
                Box::new(TerminalConfirmer::new(io::stdin().is_terminal()))
            };
            let outcome = run_install_command(
                &args,
                &settings,
                output_style,
                confirmer.as_mut(),
                cancel,
            )?;
            print_lines(&format_install_outcome(&outcome, output_style, args.json)?);
            for line in install_warning_lines(&outcome, args.json) {
                eprintln!("{line}");
            }
        }
        Commands::Backups { target, json } => {
            let sets = run_backups_command(target.as_deref())?;
            print_lines(&format_backups_output(&sets, output_style, json)?);
        }
        Commands::Config => {
            let settings = load_settings(cli.config.as_deref(), &SettingOverrides::default())?;
            print_lines(&format_settings_lines(&settings));
        }
        Commands::Completions { shell } => {
            write_completions_script(shell, &mut io::stdout().lock())?;
        }
    }

    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
