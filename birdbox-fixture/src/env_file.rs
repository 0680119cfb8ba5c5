use std::{collections::BTreeMap, path::Path};

use color_eyre::eyre::{Result, WrapErr};

/// Load KEY=VALUE pairs from a .env style file without touching the process
/// environment. The variables are handed verbatim to the started server.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<BTreeMap<String, String>> {
    let path = path.as_ref();

    let mut vars = BTreeMap::new();
    for item in dotenvy::from_filename_iter(path)
        .wrap_err_with(|| format!("failed to open env file: {}", path.display()))?
    {
        let (key, value) =
            item.wrap_err_with(|| format!("failed to parse env file: {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::load_env_file;

    #[test]
    fn parses_key_value_pairs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CUBEJS_DB_TYPE=athena").unwrap();
        writeln!(file, "CUBEJS_AWS_REGION=us-east-1").unwrap();
        writeln!(file, "CUBEJS_API_SECRET=secret").unwrap();

        let vars = load_env_file(file.path()).unwrap();

        assert_eq!(vars.len(), 3);
        assert_eq!(
            vars.get("CUBEJS_DB_TYPE").map(String::as_str),
            Some("athena")
        );
        assert_eq!(
            vars.get("CUBEJS_AWS_REGION").map(String::as_str),
            Some("us-east-1")
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_env_file("/definitely/not/here.env").is_err());
    }
}
