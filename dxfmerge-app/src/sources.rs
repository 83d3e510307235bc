use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use walkdir::WalkDir;

/// 判断路径扩展名是否匹配（不区分大小写）。
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// 列出目录下（不递归）扩展名匹配的文件，按文件名排序。
pub fn scan_folder(folder: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("无法扫描目录 {}", folder.display()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extension) {
            found.push(entry.into_path());
        }
    }
    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(found)
}

/// 显式列出的文件在前（保持给定顺序），目录扫描结果在后。
pub fn collect_sources(
    files: &[PathBuf],
    folder: Option<&Path>,
    extension: &str,
) -> Result<Vec<PathBuf>> {
    let mut sources = files.to_vec();
    if let Some(folder) = folder {
        sources.extend(scan_folder(folder, extension)?);
    }
    if sources.is_empty() {
        bail!("没有可处理的 .{extension} 文件");
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_is_flat_sorted_and_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.dxf", "A.DXF", "c.dwg", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("d.dxf"), "").unwrap();

        let found = scan_folder(dir.path(), "dxf").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["A.DXF", "b.dxf"]);
    }

    #[test]
    fn explicit_files_come_before_folder_contents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("z.dxf"), "").unwrap();
        let explicit = vec![PathBuf::from("first.dxf")];

        let sources = collect_sources(&explicit, Some(dir.path()), "dxf").unwrap();
        assert_eq!(sources, [PathBuf::from("first.dxf"), dir.path().join("z.dxf")]);
    }

    #[test]
    fn nothing_to_process_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_sources(&[], Some(dir.path()), "dxf").is_err());
        assert!(collect_sources(&[], None, "dxf").is_err());
    }
}
