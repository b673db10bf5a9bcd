//! Line-by-line diff for export documents.
//!
//! Exports are pretty-printed JSON, so a plain line comparison with common
//! prefix/suffix trimming reads well enough for review pages and change
//! request records. Unchanged lines keep a two-space margin, removals get
//! `-`, additions get `+`.

/// Diff two texts line by line.
pub fn line_diff(old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let common_prefix = old_lines
        .iter()
        .zip(new_lines.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let max_suffix = old_lines.len().min(new_lines.len()) - common_prefix;
    let common_suffix = old_lines
        .iter()
        .rev()
        .zip(new_lines.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(max_suffix);

    let mut out = String::new();

    for line in &old_lines[..common_prefix] {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }

    for line in &old_lines[common_prefix..old_lines.len() - common_suffix] {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }

    for line in &new_lines[common_prefix..new_lines.len() - common_suffix] {
        out.push_str("+ ");
        out.push_str(line);
        out.push('\n');
    }

    for line in &old_lines[old_lines.len() - common_suffix..] {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts_have_no_markers() {
        let diff = line_diff("a\nb\nc", "a\nb\nc");
        assert!(!diff.contains("- "));
        assert!(!diff.contains("+ "));
        assert_eq!(diff.lines().count(), 3);
    }

    #[test]
    fn test_changed_middle_line() {
        let diff = line_diff("a\nold\nc", "a\nnew\nc");
        assert!(diff.contains("- old"));
        assert!(diff.contains("+ new"));
        assert!(diff.contains("  a"));
        assert!(diff.contains("  c"));
    }

    #[test]
    fn test_pure_addition() {
        let diff = line_diff("a\nc", "a\nb\nc");
        assert!(diff.contains("+ b"));
        assert!(!diff.contains("- "));
    }

    #[test]
    fn test_pure_removal() {
        let diff = line_diff("a\nb\nc", "a\nc");
        assert!(diff.contains("- b"));
        assert!(!diff.contains("+ "));
    }

    #[test]
    fn test_empty_against_content() {
        let diff = line_diff("", "x\ny");
        assert_eq!(diff, "+ x\n+ y\n");
    }
}
