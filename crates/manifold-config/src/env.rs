use std::sync::LazyLock;

use regex::Regex;

// Matches `{{ env.VAR }}` and `{{ env.VAR | default("fallback") }}`.
// Group 1 is the scoped key, group 2 the optional default.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("must be valid regex")
});

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// A `| default("fallback")` filter supplies a value when the variable is
/// unset; without one, a missing variable is an error. Comment lines pass
/// through untouched so commented-out secrets do not break loading.
pub fn expand_env(input: &str) -> Result<String, String> {
    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        if line.trim_start().starts_with('#') {
            output.push_str(line);
        } else {
            expand_line(line, &mut output)?;
        }
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

fn expand_line(line: &str, output: &mut String) -> Result<(), String> {
    let mut last_end = 0;

    for captures in PLACEHOLDER.captures_iter(line) {
        let Some(overall) = captures.get(0) else { continue };
        let key = captures.get(1).map_or("", |m| m.as_str());
        let default_value = captures.get(2).map(|m| m.as_str());

        output.push_str(&line[last_end..overall.start()]);

        let var_name = match key.split_once('.') {
            Some(("env", name)) if !name.contains('.') => name,
            _ => return Err(format!("only variables scoped with 'env.' are supported: `{key}`")),
        };

        match std::env::var(var_name) {
            Ok(value) => output.push_str(&value),
            Err(_) => match default_value {
                Some(default) => output.push_str(default),
                None => return Err(format!("environment variable not found: `{var_name}`")),
            },
        }

        last_end = overall.end();
    }

    output.push_str(&line[last_end..]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let input = "api_key = \"literal\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn expands_set_variable() {
        temp_env::with_var("MANIFOLD_KEY", Some("sk-test"), || {
            let result = expand_env("api_key = \"{{ env.MANIFOLD_KEY }}\"").unwrap();
            assert_eq!(result, "api_key = \"sk-test\"");
        });
    }

    #[test]
    fn missing_variable_without_default_errors() {
        temp_env::with_var_unset("MANIFOLD_MISSING", || {
            let err = expand_env("key = \"{{ env.MANIFOLD_MISSING }}\"").unwrap_err();
            assert!(err.contains("MANIFOLD_MISSING"));
        });
    }

    #[test]
    fn default_fills_missing_variable() {
        temp_env::with_var_unset("MANIFOLD_OPT", || {
            let result = expand_env("url = \"{{ env.MANIFOLD_OPT | default(\"http://localhost\") }}\"").unwrap();
            assert_eq!(result, "url = \"http://localhost\"");
        });
    }

    #[test]
    fn set_variable_wins_over_default() {
        temp_env::with_var("MANIFOLD_OPT2", Some("real"), || {
            let result = expand_env("v = \"{{ env.MANIFOLD_OPT2 | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "v = \"real\"");
        });
    }

    #[test]
    fn comment_lines_are_not_expanded() {
        temp_env::with_var_unset("MANIFOLD_GONE", || {
            let input = "# key = \"{{ env.MANIFOLD_GONE }}\"\nname = \"x\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }

    #[test]
    fn rejects_unscoped_placeholders() {
        let err = expand_env("key = \"{{ secrets.FOO }}\"").unwrap_err();
        assert!(err.contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn multiple_placeholders_on_one_line() {
        temp_env::with_vars([("MF_A", Some("1")), ("MF_B", Some("2"))], || {
            let result = expand_env("pair = \"{{ env.MF_A }}:{{ env.MF_B }}\"").unwrap();
            assert_eq!(result, "pair = \"1:2\"");
        });
    }
}
