//! Environment variable expansion for rule and settings files.
//!
//! Rule files are expanded before JSON parsing, so references work anywhere
//! in the document:
//!
//! - `${VAR}` is replaced with the value of VAR, and errors when unset
//! - `${VAR:-default}` falls back to `default` when VAR is unset or empty
//!
//! A default value cannot contain `}`.

use std::borrow::Cow;

use anyhow::{bail, Result};

/// Expand every `${...}` reference in `text`. Returns the input unchanged
/// (and unallocated) when it contains none.
pub fn expand_env_vars(text: &str) -> Result<Cow<'_, str>> {
    if !text.contains("${") {
        return Ok(Cow::Borrowed(text));
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find("${") {
        out.push_str(&rest[..at]);
        let after = &rest[at + 2..];
        let Some(close) = after.find('}') else {
            bail!(
                "unclosed environment variable reference: ${{{}",
                &after[..after.len().min(20)]
            );
        };
        out.push_str(&expand_one(&after[..close])?);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}

fn expand_one(content: &str) -> Result<String> {
    if let Some((name, default)) = content.split_once(":-") {
        validate_var_name(name)?;
        return match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Ok(default.to_string()),
        };
    }
    validate_var_name(content)?;
    match std::env::var(content) {
        Ok(value) => Ok(value),
        Err(_) => bail!(
            "environment variable '{content}' is not set; \
             use ${{{content}:-default}} to provide a fallback"
        ),
    }
}

fn validate_var_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    match chars.next() {
        None => bail!("empty environment variable name in ${{}}"),
        Some(c) if !c.is_ascii_alphabetic() && c != '_' => {
            bail!("invalid environment variable name '{name}': must start with a letter or underscore")
        }
        Some(_) => {}
    }
    if let Some(c) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        bail!("invalid environment variable name '{name}': contains '{c}'");
    }
    Ok(())
}
