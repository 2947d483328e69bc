use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;

/// Write `value` as pretty JSON via a sibling `.tmp` file and a rename, so readers
/// see either the old file or the complete new one.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    code: &str,
    what: &str,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::new(code, format!("Failed to create directory for {what}"))
                    .with_details(format!("path={}; err={}", parent.display(), e))
            })?;
        }
    }
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new(code, format!("Failed to encode {what}")).with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new(code, format!("Failed to write {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new(code, format!("Failed to finalize {what} write"))
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path, code: &str, what: &str) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new(code, format!("Failed to read {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new(code, format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_leaves_no_tmp_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("nested").join("v.json");
        write_json_atomic(&path, &vec![1, 2, 3], "TEST", "values").expect("write");
        assert!(!path.with_extension("tmp").exists());
        let back: Vec<i32> = read_json(&path, "TEST", "values").expect("read");
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn read_reports_code_and_path() {
        let err = read_json::<Vec<i32>>(Path::new("/no/such/file.json"), "TEST", "values")
            .expect_err("missing");
        assert_eq!(err.code, "TEST");
        assert!(err.details.unwrap_or_default().contains("/no/such/file.json"));
    }
}
