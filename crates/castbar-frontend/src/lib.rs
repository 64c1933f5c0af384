//! Terminal shell for castbar.
//!
//! Reads menu commands from a line-oriented input, forwards them to the
//! [`LifecycleController`] and prints what the controller reports back through
//! [`TerminalShell`].

use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::Context;
use castbar_backend::LifecycleController;
use castbar_bridge::config::{PlayerHardwareDecode, PlayerPosition, PlayerSize};
use castbar_bridge::shell::Shell;

use crate::commands::{Command, CommandError, HELP};
use crate::formatting::{about_label, format_choices, ip_label, switch_label, toggle_label};

pub mod commands;
pub mod formatting;
mod shell;

pub use crate::shell::TerminalShell;

/// Whether the run loop continues after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Runs the shell on stdin until `quit` or end of input.
pub fn run(controller: &mut LifecycleController, shell: &Arc<TerminalShell>) -> anyhow::Result<()> {
    let stdin = io::stdin();
    run_with_input(controller, shell, stdin.lock())
}

/// Runs the shell on `input`. End of input quits like the `quit` command.
pub fn run_with_input(
    controller: &mut LifecycleController,
    shell: &Arc<TerminalShell>,
    input: impl BufRead,
) -> anyhow::Result<()> {
    print_status(controller, shell);
    shell.line("type `help` for commands");

    for line in input.lines() {
        let line = line.context("failed to read a command")?;
        match line.parse::<Command>() {
            Ok(command) => {
                if execute(controller, shell, command)? == Flow::Quit {
                    return Ok(());
                }
            }
            Err(CommandError::Empty) => {}
            Err(err) => shell.line(err),
        }
    }

    log::debug!("Input closed, quitting");
    execute(controller, shell, Command::Quit).map(|_| ())
}

/// Executes one command.
///
/// Settings failures have already been notified by the controller and only
/// get logged here. Failing to stop the service on quit is returned.
pub fn execute(
    controller: &mut LifecycleController,
    shell: &TerminalShell,
    command: Command,
) -> anyhow::Result<Flow> {
    log::debug!("Command: {command:?}");
    let settings_result = match command {
        Command::Toggle => {
            match controller.toggle() {
                Ok(state) => shell.line(format_args!("Service is now {state}")),
                Err(err) => shell.notification("Error", &err.to_string()),
            }
            Ok(())
        }
        Command::CheckUpdate => {
            // detached: the outcome is reported to the shell when it arrives
            drop(controller.check_update(true));
            Ok(())
        }
        Command::About => {
            controller.about();
            Ok(())
        }
        Command::Status => {
            print_status(controller, shell);
            Ok(())
        }
        Command::Size(size) => controller.set_player_size(size),
        Command::Position(position) => controller.set_player_position(position),
        Command::HardwareDecode(decode) => controller.set_player_hardware_decode(decode),
        Command::AutoCheck(enabled) => controller.set_check_update_on_startup(enabled),
        Command::StartAtLogin(enabled) => controller.set_start_at_login(enabled),
        Command::CopyUri => {
            match shell.video_uri() {
                Some(uri) => shell.line(uri),
                None => shell.line("Nothing is playing"),
            }
            Ok(())
        }
        Command::Help => {
            shell.line(HELP);
            Ok(())
        }
        Command::Quit => {
            controller
                .quit()
                .context("failed to stop the backend service")?;
            return Ok(Flow::Quit);
        }
    };

    if let Err(err) = settings_result {
        log::warn!("{command:?} failed: {err}");
    }
    Ok(Flow::Continue)
}

/// Prints the menu as the tray would show it.
pub fn print_status(controller: &LifecycleController, shell: &TerminalShell) {
    let settings = controller.settings();
    let address = shell
        .address()
        .unwrap_or_else(|| controller.ip_address().to_string());

    shell.line(about_label(&controller.version()));
    shell.line(toggle_label(controller.state()));
    shell.line(ip_label(address));
    if let Some(uri) = controller.now_playing() {
        shell.line(format_args!("Copy Video URI: {uri}"));
    }
    shell.line(format_args!(
        "size      {}",
        format_choices(&PlayerSize::ALL, settings.player_size(), PlayerSize::label)
    ));
    shell.line(format_args!(
        "position  {}",
        format_choices(
            &PlayerPosition::ALL,
            settings.player_position(),
            PlayerPosition::label
        )
    ));
    shell.line(format_args!(
        "hw        {}",
        format_choices(
            &PlayerHardwareDecode::ALL,
            settings.player_hardware_decode(),
            PlayerHardwareDecode::label
        )
    ));
    shell.line(format_args!(
        "autocheck {}",
        switch_label(settings.check_update_on_startup())
    ));
    shell.line(format_args!("login     {}", switch_label(settings.start_at_login())));
}
