//! `${VAR}` expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// Values without `${` are returned as-is, so a bare `$` (common in shell
/// snippets passed through `renderer.command`) never triggers a lookup.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    let mut unset = Vec::new();
    let expanded = shellexpand::env_with_context_no_errors(value, |name| {
        let found = std::env::var(name).ok();
        if found.is_none() {
            unset.push(name.to_owned());
        }
        found
    })
    .into_owned();

    // Unset variables without a `:-default` survive expansion verbatim.
    if let Some(name) = unset
        .iter()
        .find(|name| expanded.contains(&format!("${{{name}}}")))
    {
        return Err(ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{name}}} not set"),
        });
    }

    Ok(expanded)
}
