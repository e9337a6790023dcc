//! Interactive terminal front end.
//!
//! DESIGN
//! ======
//! Each input line is one command. Remote actions (generate, save, refresh)
//! run as background tasks so the prompt stays responsive and the
//! "Generating..." state is visible; the view is redrawn when a command is
//! handled and again when each background action finishes. Sign-in commands
//! run inline because their outcome is reported directly.

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinSet;
use tracing::warn;

use crate::app::NamerApp;

const HELP: &str = "\
commands:
  login <email>     send a sign-in code
  code <code>       finish signing in
  type <text>       set the pet type
  traits <text>     set the characteristics
  generate          suggest names
  save <n>          save candidate n
  refresh           reload saved names
  logout            sign out
  help              show this help
  quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Redraw,
    Help,
    Quit,
    Login { email: String },
    Code { code: String },
    SetType(String),
    SetTraits(String),
    Generate,
    Save(usize),
    Refresh,
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{command}` needs {argument}")]
    MissingArgument { command: &'static str, argument: &'static str },
    #[error("`{0}` is not a candidate number")]
    InvalidIndex(String),
}

/// Parse one input line.
///
/// # Errors
///
/// Returns a [`ParseError`] for unknown commands, missing arguments, or a
/// non-numeric save index.
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    let required = |command: &'static str, argument: &'static str| {
        if rest.is_empty() {
            Err(ParseError::MissingArgument { command, argument })
        } else {
            Ok(rest.to_string())
        }
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Ok(Command::Redraw),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        "login" => required("login", "an email").map(|email| Command::Login { email }),
        "code" => required("code", "the code from your email").map(|code| Command::Code { code }),
        // Free text: an empty value clears the field.
        "type" => Ok(Command::SetType(rest.to_string())),
        "traits" => Ok(Command::SetTraits(rest.to_string())),
        "generate" => Ok(Command::Generate),
        "save" => {
            let raw = required("save", "a candidate number")?;
            raw.parse::<usize>()
                .map(Command::Save)
                .map_err(|_| ParseError::InvalidIndex(raw))
        }
        "refresh" => Ok(Command::Refresh),
        "logout" => Ok(Command::Logout),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

/// Run the command loop until `quit` or end of input. Background actions
/// still running at end of input are awaited before returning.
///
/// # Errors
///
/// Returns an I/O error if reading input or writing output fails.
pub async fn run<R, W>(app: &NamerApp, input: R, mut output: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut actions = JoinSet::new();
    let mut pending_email: Option<String> = None;

    draw(app, &mut output)?;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        writeln!(output, "{e}")?;
                        continue;
                    }
                };
                if command == Command::Quit {
                    break;
                }
                handle(app, command, &mut actions, &mut pending_email, &mut output).await?;
                draw(app, &mut output)?;
            }
            Some(finished) = actions.join_next(), if !actions.is_empty() => {
                if let Err(e) = finished {
                    warn!(error = %e, "background action failed");
                }
                draw(app, &mut output)?;
            }
        }
    }

    while let Some(finished) = actions.join_next().await {
        if let Err(e) = finished {
            warn!(error = %e, "background action failed");
        }
    }
    draw(app, &mut output)?;
    output.flush()
}

async fn handle<W: Write>(
    app: &NamerApp,
    command: Command,
    actions: &mut JoinSet<()>,
    pending_email: &mut Option<String>,
    output: &mut W,
) -> io::Result<()> {
    match command {
        Command::Redraw | Command::Quit => {}
        Command::Help => writeln!(output, "{HELP}")?,
        Command::Login { email } => match app.send_magic_link(&email).await {
            Ok(()) => {
                writeln!(output, "Check {email} for your sign-in code, then enter `code <code>`.")?;
                *pending_email = Some(email);
            }
            Err(e) => writeln!(output, "Could not send sign-in code: {e}")?,
        },
        Command::Code { code } => {
            let Some(email) = pending_email.as_deref() else {
                return writeln!(output, "Run `login <email>` first.");
            };
            if let Err(e) = app.verify_code(email, &code).await {
                writeln!(output, "Sign-in failed: {e}")?;
            }
        }
        Command::SetType(value) => app.set_pet_type(value),
        Command::SetTraits(value) => app.set_characteristics(value),
        Command::Generate => {
            let app = app.clone();
            actions.spawn(async move { app.generate_names().await });
            // Let the action reach its first suspension point so the
            // redraw shows the in-flight state.
            tokio::task::yield_now().await;
        }
        Command::Save(index) => match app.candidate(index) {
            Some(name) => {
                let app = app.clone();
                actions.spawn(async move { app.save_name(&name).await });
            }
            None => writeln!(output, "No candidate {index}.")?,
        },
        Command::Refresh => {
            let app = app.clone();
            actions.spawn(async move { app.refresh_saved_names().await });
        }
        Command::Logout => app.sign_out().await,
    }
    Ok(())
}

fn draw<W: Write>(app: &NamerApp, output: &mut W) -> io::Result<()> {
    writeln!(output)?;
    write!(output, "{}", app.view())?;
    write!(output, "> ")?;
    output.flush()
}

#[cfg(test)]
#[path = "terminal_test.rs"]
mod tests;
