use regex::Regex;

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// `{{ env.VAR | default("fallback") }}` uses the fallback when the
/// variable is unset; without one an unset variable is an error. Lines
/// starting with `#` are passed through unchanged.
pub fn expand_env(input: &str) -> Result<String, String> {
    let re = Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
        .map_err(|e| e.to_string())?;

    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut last_end = 0;
        for captures in re.captures_iter(line) {
            let (Some(overall), Some(key)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let default_value = captures.get(2).map(|m| m.as_str());

            output.push_str(&line[last_end..overall.start()]);

            let mut parts = key.as_str().split('.');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("env"), Some(var_name), None) => match (std::env::var(var_name), default_value) {
                    (Ok(value), _) => output.push_str(&value),
                    (Err(_), Some(default)) => output.push_str(default),
                    (Err(_), None) => return Err(format!("environment variable not found: `{var_name}`")),
                },
                _ => {
                    return Err(format!(
                        "only variables scoped with 'env.' are supported: `{}`",
                        key.as_str()
                    ));
                }
            }

            last_end = overall.end();
        }
        output.push_str(&line[last_end..]);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}
