use std::process::{Command, Stdio};

use tracing::{debug, error, trace};

/// Splits a command line into words. Single and double quotes group words,
/// and backslash escapes are honored inside quotes.
pub fn parse_command(command: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = command.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' => in_quotes = !in_quotes,
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            '\\' if in_quotes => match chars.next() {
                Some('n') => current.push('\n'),
                Some('t') => current.push('\t'),
                Some(c @ ('\\' | '\'' | '"')) => current.push(c),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Launches a program detached from the window manager. A thread waits for
/// it so it does not linger as a zombie.
pub fn spawn_program(command: &str) {
    let parts = parse_command(command);
    let Some((program, args)) = parts.split_first() else {
        error!("Refusing to launch an empty command");
        return;
    };

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn();
    let child = match child {
        Ok(child) => child,
        Err(e) => {
            error!("Failed to launch '{command}': {e}");
            return;
        }
    };
    debug!(pid = child.id(), "Launched '{command}'");

    let command = command.to_owned();
    std::thread::spawn(move || match child.wait_with_output() {
        Ok(output) if output.status.success() => trace!("'{command}' exited"),
        Ok(output) => {
            error!("'{command}' exited with {}", output.status);
            if !output.stderr.is_empty() {
                error!("stderr: {}", String::from_utf8_lossy(&output.stderr));
            }
        }
        Err(e) => error!("Waiting for '{command}' failed: {e}"),
    });
}

pub fn execute_startup_commands(commands: &[String]) {
    trace!("Executing {} startup commands", commands.len());
    for command in commands {
        spawn_program(command);
    }
}
