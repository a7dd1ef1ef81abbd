//! Computes the content-addressed transaction id: a SHA-256 digest over the
//! canonicalized contents of every file in a transaction directory.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

pub fn compute_tx_id(tx_dir: &Path) -> std::io::Result<String> {
    let mut files = Vec::new();
    collect_files(tx_dir, tx_dir, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for relative in &files {
        let absolute = tx_dir.join(relative);
        let normalized = normalize_file(&absolute)?;
        hasher.update(format!("## {}\n", relative.to_string_lossy().replace('\\', "/")));
        hasher.update(&normalized);
        if !normalized.ends_with('\n') {
            hasher.update("\n");
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if path.is_file() {
            out.push(path.strip_prefix(root).unwrap().to_path_buf());
        }
    }
    Ok(())
}

fn normalize_file(path: &Path) -> std::io::Result<String> {
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let text = std::fs::read_to_string(path)?;
    if is_toml {
        let value: toml::Value = toml::from_str(&text).unwrap_or(toml::Value::Table(Default::default()));
        Ok(dump_canonical_toml(&value, 0))
    } else {
        Ok(normalize_text(&text))
    }
}

fn normalize_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = text.split('\n').map(|l| l.trim_end()).collect();
    let joined = lines.join("\n");
    format!("{}\n", joined.trim_matches('\n'))
}

/// Recursively dumps a TOML value with keys sorted at every depth, so that
/// reordering a transaction's `survey_meta.toml` keys does not change the
/// computed transaction id.
fn dump_canonical_toml(value: &toml::Value, indent: usize) -> String {
    match value {
        toml::Value::Table(table) => {
            let mut keys: Vec<&String> = table.keys().collect();
            keys.sort();
            let mut lines = Vec::new();
            for key in keys {
                let v = &table[key];
                match v {
                    toml::Value::Table(_) => {
                        if !lines.is_empty() {
                            lines.push(String::new());
                        }
                        lines.push(format!("{}[{}]", pad(indent), key));
                        lines.push(dump_canonical_toml(v, indent));
                    }
                    toml::Value::Array(items) if is_table_array(items) => {
                        for item in items {
                            if !lines.is_empty() {
                                lines.push(String::new());
                            }
                            lines.push(format!("{}[[{}]]", pad(indent), key));
                            lines.push(dump_canonical_toml(item, indent));
                        }
                    }
                    other => {
                        lines.push(format!("{}{} = {}", pad(indent), key, serialize_scalar(other)));
                    }
                }
            }
            lines.join("\n")
        }
        toml::Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(serialize_scalar).collect();
            format!("[{}]", rendered.join(", "))
        }
        other => serialize_scalar(other),
    }
}

fn is_table_array(items: &[toml::Value]) -> bool {
    !items.is_empty() && items.iter().all(|v| matches!(v, toml::Value::Table(_)))
}

fn serialize_scalar(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Datetime(d) => d.to_string(),
        toml::Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(serialize_scalar).collect();
            format!("[{}]", rendered.join(", "))
        }
        toml::Value::Table(_) => String::new(),
    }
}

fn pad(indent: usize) -> String {
    "    ".repeat(indent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_id_is_stable_under_crlf_and_key_reorder() {
        let dir_a = tempfile::tempdir().unwrap();
        std::fs::write(dir_a.path().join("measurements.csv"), "a,b\r\n1,2\r\n").unwrap();
        std::fs::write(
            dir_a.path().join("survey_meta.toml"),
            "survey_id = \"2019\"\nstart = 2019-06-01\n",
        )
        .unwrap();

        let dir_b = tempfile::tempdir().unwrap();
        std::fs::write(dir_b.path().join("measurements.csv"), "a,b\n1,2\n").unwrap();
        std::fs::write(
            dir_b.path().join("survey_meta.toml"),
            "start = 2019-06-01\nsurvey_id = \"2019\"\n",
        )
        .unwrap();

        assert_eq!(
            compute_tx_id(dir_a.path()).unwrap(),
            compute_tx_id(dir_b.path()).unwrap()
        );
    }
}
