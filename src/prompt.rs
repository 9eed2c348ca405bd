//! Terminal prompts for connection details the command line left out.

use std::{
    io::{self, IsTerminal},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use dialoguer::{Input, Password, Select, theme::ColorfulTheme};
use log::{debug, warn};

use crate::bonita::ProcessDefinition;

fn interactive() -> bool {
    io::stdin().is_terminal() && io::stderr().is_terminal()
}

/// Returns `provided`, or asks with `default` pre-filled. Without a terminal
/// the default is used.
pub fn text_or_prompt(provided: Option<&str>, prompt: &str, default: &str) -> Result<String> {
    if let Some(value) = provided {
        return Ok(value.to_string());
    }
    if !interactive() {
        debug!("No terminal, using default for {prompt}: {default}");
        return Ok(default.to_string());
    }
    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default.to_string())
        .allow_empty(true)
        .interact_text()
        .with_context(|| format!("Reading {prompt}"))?;
    let answer = answer.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

pub fn password_or_prompt(provided: Option<&str>, prompt: &str) -> Result<String> {
    if let Some(value) = provided {
        return Ok(value.to_string());
    }
    if !interactive() {
        return Err(anyhow!(
            "No password given and no terminal to ask for one; use --password"
        ));
    }
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .context("Reading password")
}

/// Returns `provided`, or asks for a path. Without a terminal a missing path
/// is an error naming `flag`.
pub fn path_or_prompt(provided: Option<&Path>, prompt: &str, flag: &str) -> Result<PathBuf> {
    if let Some(path) = provided {
        return Ok(path.to_path_buf());
    }
    if !interactive() {
        return Err(anyhow!(
            "No {prompt} given and no terminal to ask for one; use {flag}"
        ));
    }
    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact_text()
        .with_context(|| format!("Reading {prompt}"))?;
    Ok(PathBuf::from(answer.trim()))
}

/// Finds the process matching `name` and `version` exactly.
pub fn find_process<'a>(
    processes: &'a [ProcessDefinition],
    name: Option<&str>,
    version: Option<&str>,
) -> Option<&'a ProcessDefinition> {
    let (name, version) = (name?, version?);
    processes
        .iter()
        .find(|process| process.name == name && process.version == version)
}

/// Uses the process named on the command line, otherwise lets the user pick.
pub fn select_process<'a>(
    processes: &'a [ProcessDefinition],
    name: Option<&str>,
    version: Option<&str>,
) -> Result<&'a ProcessDefinition> {
    if processes.is_empty() {
        return Err(anyhow!("No deployed processes found on the server"));
    }
    if let Some(process) = find_process(processes, name, version) {
        return Ok(process);
    }
    if let (Some(name), Some(version)) = (name, version) {
        warn!("Process '{name}' ({version}) is not deployed, select one instead");
    }
    if !interactive() {
        return Err(anyhow!(
            "No matching process and no terminal to select one; use --process-name and --process-version"
        ));
    }
    let items = processes
        .iter()
        .enumerate()
        .map(|(idx, process)| format!("{}. {process}", idx + 1))
        .collect::<Vec<_>>();
    let selected = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select process")
        .items(&items)
        .default(0)
        .interact()
        .context("Selecting process")?;
    Ok(&processes[selected])
}
