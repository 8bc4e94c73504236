use regex::Regex;

use crate::api::RemoteEntry;

/// 目录列表的筛选谓词，按顺序全部通过才保留
#[derive(Debug, Clone)]
pub enum Sifter {
    /// 路径匹配该模式才保留
    Include(Regex),
    /// 路径匹配该模式则丢弃
    Exclude(Regex),
    /// 只保留文件
    IsFile,
    /// 只保留目录
    IsDir,
}

impl Sifter {
    fn keep(&self, entry: &RemoteEntry) -> bool {
        match self {
            Sifter::Include(re) => re.is_match(&entry.path),
            Sifter::Exclude(re) => !re.is_match(&entry.path),
            Sifter::IsFile => entry.is_file(),
            Sifter::IsDir => entry.is_dir,
        }
    }
}

/// 对目录列表应用筛选。
///
/// 递归模式下目录一律保留，否则无法下降到匹配的文件。
pub fn sift(entries: Vec<RemoteEntry>, sifters: &[Sifter], recursive: bool) -> Vec<RemoteEntry> {
    entries
        .into_iter()
        .filter(|e| {
            if recursive && e.is_dir {
                return true;
            }
            sifters.iter().all(|s| s.keep(e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, is_dir: bool) -> RemoteEntry {
        RemoteEntry { path: path.to_string(), is_dir, size: 0 }
    }

    #[test]
    fn test_include_exclude() {
        let entries = vec![
            entry("/a/1.mp4", false),
            entry("/a/2.txt", false),
            entry("/a/3.mp4", false),
        ];
        let sifters = vec![
            Sifter::Include(Regex::new(r"\.mp4$").unwrap()),
            Sifter::Exclude(Regex::new("3").unwrap()),
        ];
        let kept = sift(entries, &sifters, false);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].path, "/a/1.mp4");
    }

    #[test]
    fn test_recursive_keeps_dirs() {
        let entries = vec![entry("/a/sub", true), entry("/a/1.txt", false)];
        let sifters = vec![Sifter::Include(Regex::new(r"\.mp4$").unwrap())];

        // 非递归时目录也参与筛选
        let kept = sift(entries.clone(), &sifters, false);
        assert!(kept.is_empty());

        // 递归时目录无条件保留
        let kept = sift(entries, &sifters, true);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].is_dir);
    }
}
