//! 归档读写
//!
//! 只处理内存中的归档字节，文件读写由调用方负责。

use std::io::{Cursor, Read, Write};
use zip::result::ZipResult;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// 归档文件扩展名
pub const ARCHIVE_EXTENSION: &str = ".jar";

/// 路径是否指向归档
pub fn is_archive(path: &str) -> bool {
    path.ends_with(ARCHIVE_EXTENSION)
}

/// 按归档内顺序读取名称满足条件的条目，跳过目录条目
pub fn read_entries<F>(bytes: &[u8], mut keep: F) -> ZipResult<Vec<(String, Vec<u8>)>>
where
    F: FnMut(&str) -> bool,
{
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() || !keep(file.name()) {
            continue;
        }
        let name = file.name().to_string();
        let mut content = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut content)?;
        entries.push((name, content));
    }
    Ok(entries)
}

/// 替换或删除一个条目，其余条目原样复制
///
/// `replacement` 为 `None` 时删除该条目；条目不存在且需要写入时追加到末尾
pub fn replace_entry(bytes: &[u8], entry: &str, replacement: Option<&[u8]>) -> ZipResult<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(bytes.len())));
    let mut written = false;

    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        if file.name() != entry {
            writer.raw_copy_file(file)?;
            continue;
        }
        let options = SimpleFileOptions::default().compression_method(file.compression());
        drop(file);
        if let Some(content) = replacement {
            writer.start_file(entry, options)?;
            writer.write_all(content)?;
            written = true;
        }
    }

    if let (Some(content), false) = (replacement, written) {
        writer.start_file(entry, SimpleFileOptions::default())?;
        writer.write_all(content)?;
    }

    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
pub(crate) fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(name.trim_end_matches('/'), SimpleFileOptions::default())
                .unwrap();
            continue;
        }
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        build_archive(&[
            ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
            ("com/", ""),
            ("com/Registry.class", "old"),
            ("com/Other.class", "other"),
        ])
    }

    #[test]
    fn test_read_entries_in_order() {
        let entries = read_entries(&sample(), |name| name.ends_with(".class")).unwrap();
        let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["com/Registry.class", "com/Other.class"]);
        assert_eq!(entries[1].1, b"other");
    }

    #[test]
    fn test_replace_keeps_other_entries() {
        let rewritten = replace_entry(&sample(), "com/Registry.class", Some(&b"new"[..])).unwrap();
        let entries = read_entries(&rewritten, |_| true).unwrap();
        assert_eq!(
            entries,
            vec![
                ("META-INF/MANIFEST.MF".to_string(), b"Manifest-Version: 1.0\n".to_vec()),
                ("com/Registry.class".to_string(), b"new".to_vec()),
                ("com/Other.class".to_string(), b"other".to_vec()),
            ]
        );
    }

    #[test]
    fn test_remove_and_append() {
        let removed = replace_entry(&sample(), "com/Other.class", None).unwrap();
        let names: Vec<String> = read_entries(&removed, |_| true)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["META-INF/MANIFEST.MF", "com/Registry.class"]);

        let appended = replace_entry(&removed, "com/New.class", Some(&b"n"[..])).unwrap();
        let last = read_entries(&appended, |_| true).unwrap().pop().unwrap();
        assert_eq!(last, ("com/New.class".to_string(), b"n".to_vec()));
    }

    #[test]
    fn test_corrupt_archive_is_error() {
        assert!(read_entries(b"not a zip", |_| true).is_err());
        assert!(replace_entry(b"not a zip", "a.class", Some(&b"x"[..])).is_err());
    }
}
