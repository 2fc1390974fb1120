//! Terminal prompts.

use dialoguer::{Confirm, Input, Password, Select};
use std::io::{self, IsTerminal};
use tokenwarden_core::{PromptError, Secret, SecretPrompt};

/// Prompts on the controlling terminal with `dialoguer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

fn map_error(err: dialoguer::Error) -> PromptError {
    match err {
        dialoguer::Error::IO(e) if e.kind() == io::ErrorKind::Interrupted => PromptError::Cancelled,
        dialoguer::Error::IO(e) => PromptError::Failed {
            message: e.to_string(),
        },
    }
}

fn ensure_terminal() -> Result<(), PromptError> {
    if io::stdin().is_terminal() {
        Ok(())
    } else {
        Err(PromptError::Failed {
            message: "stdin is not an interactive terminal".to_string(),
        })
    }
}

impl TerminalPrompt {
    /// Ask for a line of text.
    ///
    /// `check` returns a message when the input is rejected; the prompt repeats.
    pub fn text<F>(&self, label: &str, allow_empty: bool, mut check: F) -> Result<String, PromptError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        ensure_terminal()?;

        let value = Input::<String>::new()
            .with_prompt(label)
            .allow_empty(allow_empty)
            .validate_with(|input: &String| match check(input.trim()) {
                Some(message) => Err(message),
                None => Ok(()),
            })
            .interact_text()
            .map_err(map_error)?;

        Ok(value.trim().to_string())
    }

    /// Ask a yes/no question.
    pub fn confirm(&self, label: &str, default: bool) -> Result<bool, PromptError> {
        ensure_terminal()?;

        Confirm::new()
            .with_prompt(label)
            .default(default)
            .interact_opt()
            .map_err(map_error)?
            .ok_or(PromptError::Cancelled)
    }

    /// Pick one of `items`; Esc cancels.
    pub fn select(&self, label: &str, items: &[String]) -> Result<usize, PromptError> {
        ensure_terminal()?;

        Select::new()
            .with_prompt(label)
            .items(items)
            .default(0)
            .interact_opt()
            .map_err(map_error)?
            .ok_or(PromptError::Cancelled)
    }
}

impl SecretPrompt for TerminalPrompt {
    fn prompt_secret(&self, label: &str) -> Result<Secret, PromptError> {
        ensure_terminal()?;

        let value = Password::new()
            .with_prompt(label)
            .allow_empty_password(false)
            .interact()
            .map_err(map_error)?;

        Ok(Secret::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_is_cancelled() {
        let err = dialoguer::Error::IO(io::Error::new(io::ErrorKind::Interrupted, "^C"));
        assert!(matches!(map_error(err), PromptError::Cancelled));

        let err = dialoguer::Error::IO(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(matches!(map_error(err), PromptError::Failed { .. }));
    }
}
