use eyre::{Result, bail};
use std::path::Path;

/// Inserts or replaces top level keys of a json object file in place
pub fn update<T>(json_path: &Path, keyval: Vec<(&str, T)>) -> Result<()>
where
    T: std::fmt::Display + serde::Serialize,
{
    let file = std::fs::File::open(json_path)?;
    let mut json = serde_json::from_reader::<_, serde_json::Value>(&file)?;
    let Some(obj) = json.as_object_mut() else {
        bail!("{} is not a json object", json_path.display())
    };
    for (key, val) in keyval.iter() {
        obj.insert(key.to_string(), serde_json::json!(val));
    }
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        // Add truncate or shorter content leaves trailing garbage
        .truncate(true)
        .open(json_path)?;
    serde_json::to_writer(&mut file, &obj)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_shrinks_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.json");
        std::fs::write(&path, r#"{"pubkey":"aaaaaaaaaaaaaaaaaaaaaaaa","version":4}"#).unwrap();
        update(&path, vec![("pubkey", "bb")]).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["pubkey"], "bb");
        assert_eq!(json["version"], 4);

        std::fs::write(&path, "[1,2]").unwrap();
        assert!(update(&path, vec![("pubkey", "bb")]).is_err());
    }
}
