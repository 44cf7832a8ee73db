//! # Positional Snapshot Diff
//!
//! A coarse, line-paired diff used for the amendment log. Lines are
//! trimmed and compared by position; an inserted line therefore shows up
//! as a run of changed pairs rather than a single addition. Audit displays
//! are built around this exact output, so it must not be replaced by a
//! minimal-edit diff.
//!
//! ```text
//! "- old\n"            old line non-empty, new line empty
//! "+ new\n"            old line empty, new line non-empty
//! "- old\n+ new\n"     both non-empty and different
//! ```

/// Returned when both texts are byte-identical.
pub const NO_CHANGES: &str = "No changes";

/// Returned when the texts differ but every trimmed line pair matches.
pub const STRUCTURAL_ONLY: &str = "Structural changes only";

/// Diff two snapshot texts line by line.
pub fn generate_diff(old: &str, new: &str) -> String {
    if old == new {
        return NO_CHANGES.to_string();
    }

    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();
    let len = old_lines.len().max(new_lines.len());

    let mut out = String::new();
    let mut changes = 0usize;
    for i in 0..len {
        let o = old_lines.get(i).map_or("", |l| l.trim());
        let n = new_lines.get(i).map_or("", |l| l.trim());
        if o == n {
            continue;
        }
        match (o.is_empty(), n.is_empty()) {
            (false, true) => out.push_str(&format!("- {o}\n")),
            (true, false) => out.push_str(&format!("+ {n}\n")),
            _ => out.push_str(&format!("- {o}\n+ {n}\n")),
        }
        changes += 1;
    }

    if changes == 0 {
        STRUCTURAL_ONLY.to_string()
    } else {
        out
    }
}
