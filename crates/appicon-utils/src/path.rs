use std::{env, path::PathBuf};

use nix::unistd::{getuid, User};

use crate::error::{PathError, PathResult};

/// Returns the user's home directory.
///
/// `$HOME` wins when set. Otherwise the passwd entry of the current uid is
/// consulted, and `/` is the last resort.
pub fn home_dir() -> PathBuf {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }

    User::from_uid(getuid())
        .ok()
        .flatten()
        .map(|user| user.dir)
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Returns `$XDG_CONFIG_HOME`, defaulting to `~/.config`.
pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"))
}

/// Resolves a user supplied path into an absolute one.
///
/// A leading `~` becomes the home directory, `$VAR` and `${VAR}` are
/// replaced with the environment value, and relative results are joined
/// onto the current working directory.
///
/// # Errors
///
/// * [`PathError::Empty`] if the input is blank
/// * [`PathError::MissingEnvVar`] if a referenced variable is not set
/// * [`PathError::UnclosedVariable`] for `${` without a closing brace
/// * [`PathError::CurrentDir`] if the working directory cannot be read
pub fn resolve_path(input: &str) -> PathResult<PathBuf> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    let expanded = PathBuf::from(expand(input)?);
    if expanded.is_absolute() {
        return Ok(expanded);
    }

    env::current_dir()
        .map(|cwd| cwd.join(expanded))
        .map_err(|source| PathError::CurrentDir { source })
}

fn expand(input: &str) -> PathResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    if let Some(stripped) = rest.strip_prefix('~') {
        if stripped.is_empty() || stripped.starts_with('/') {
            out.push_str(&home_dir().to_string_lossy());
            rest = stripped;
        }
    }

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, remainder) = if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}').ok_or_else(|| {
                PathError::UnclosedVariable {
                    input: rest[pos..].to_string(),
                }
            })?;
            (&braced[..end], &braced[end + 1..])
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], &after[end..])
        };

        if name.is_empty() {
            out.push('$');
        } else {
            let value = env::var(name).map_err(|_| {
                PathError::MissingEnvVar {
                    var: name.to_string(),
                    input: input.to_string(),
                }
            })?;
            out.push_str(&value);
        }
        rest = remainder;
    }

    out.push_str(rest);
    Ok(out)
}
