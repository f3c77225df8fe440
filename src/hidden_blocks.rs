//! Grouping of unchanged line runs into foldable blocks.

use std::collections::{BTreeSet, HashMap};

use crate::compute_lines::LineInformation;

/// A maximal run of unchanged rows that can collapse behind one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Stable identifier for expand/collapse tracking, incrementing from 0.
    pub index: usize,
    /// First row index of the run.
    pub start_line: usize,
    /// Last row index of the run (inclusive).
    pub end_line: usize,
    /// Number of rows in the run.
    pub lines: usize,
}

/// Output of [`compute_hidden_blocks`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HiddenBlocks {
    /// Row index -> block index, for O(1) membership tests while rendering.
    pub line_blocks: HashMap<usize, usize>,
    pub blocks: Vec<Block>,
}

/// Scan the aligned rows and group contiguous runs of unchanged rows into
/// blocks. A row qualifies when no changed row (member of `diff_lines`) lies
/// within `extra_lines` of it; pinned rows are already members of
/// `diff_lines` (see [`crate::compute_lines::compute_line_information`]) and
/// therefore never get absorbed.
pub fn compute_hidden_blocks(
    line_information: &[LineInformation],
    diff_lines: &BTreeSet<usize>,
    extra_lines: usize,
) -> HiddenBlocks {
    let mut line_blocks = HashMap::new();
    let mut blocks: Vec<Block> = Vec::new();
    let mut open: Option<usize> = None;

    for line_index in 0..line_information.len() {
        let low = line_index.saturating_sub(extra_lines);
        let high = line_index + extra_lines;
        let near_diff = diff_lines.range(low..=high).next().is_some();

        if near_diff {
            open = None;
        } else if let Some(index) = open {
            let block = &mut blocks[index];
            block.end_line = line_index;
            block.lines += 1;
            line_blocks.insert(line_index, index);
        } else {
            let index = blocks.len();
            blocks.push(Block {
                index,
                start_line: line_index,
                end_line: line_index,
                lines: 1,
            });
            line_blocks.insert(line_index, index);
            open = Some(index);
        }
    }

    HiddenBlocks {
        line_blocks,
        blocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_lines::{compute_line_information, DiffOptions, LineId};
    use pretty_assertions::assert_eq;

    fn diff(old: &str, new: &str, pins: Vec<LineId>) -> (Vec<LineInformation>, BTreeSet<usize>) {
        let result = compute_line_information(&DiffOptions {
            old: old.into(),
            new: new.into(),
            always_show_lines: pins,
            ..DiffOptions::default()
        })
        .unwrap();
        (result.line_information, result.diff_lines)
    }

    #[test]
    fn zero_margin_blocks_abut_changes() {
        // Rows: 0..=4 default, 5 changed, 6..=8 default.
        let old = "a\nb\nc\nd\ne\nf\ng\nh\ni";
        let new = "a\nb\nc\nd\ne\nX\ng\nh\ni";
        let (rows, diff_lines) = diff(old, new, vec![]);
        let hidden = compute_hidden_blocks(&rows, &diff_lines, 0);

        assert_eq!(hidden.blocks.len(), 2);
        assert_eq!(hidden.blocks[0].start_line, 0);
        assert_eq!(hidden.blocks[0].end_line, 4);
        assert_eq!(hidden.blocks[0].lines, 5);
        assert_eq!(hidden.blocks[1].start_line, 6);
        assert_eq!(hidden.blocks[1].end_line, 8);
        assert!(!hidden.line_blocks.contains_key(&5));
    }

    #[test]
    fn margin_keeps_context_visible() {
        let old = "a\nb\nc\nd\ne\nf\ng\nh\ni";
        let new = "a\nb\nc\nd\ne\nX\ng\nh\ni";
        let (rows, diff_lines) = diff(old, new, vec![]);
        let hidden = compute_hidden_blocks(&rows, &diff_lines, 2);

        assert_eq!(hidden.blocks.len(), 2);
        assert_eq!(hidden.blocks[0].start_line, 0);
        assert_eq!(hidden.blocks[0].end_line, 2);
        // Rows 3, 4, 6 and 7 are within 2 rows of the change at 5.
        for row in [3, 4, 6, 7] {
            assert!(!hidden.line_blocks.contains_key(&row));
        }
        assert_eq!(hidden.blocks[1].start_line, 8);
        assert_eq!(hidden.blocks[1].end_line, 8);
    }

    #[test]
    fn every_row_in_at_most_one_block() {
        let old = "a\nb\nc\nd\ne\nf\ng\nh\ni\nj";
        let new = "a\nX\nc\nd\ne\nf\ng\nh\nY\nj";
        let (rows, diff_lines) = diff(old, new, vec![]);
        let hidden = compute_hidden_blocks(&rows, &diff_lines, 1);

        for (row, block_index) in &hidden.line_blocks {
            let block = &hidden.blocks[*block_index];
            assert!(*row >= block.start_line && *row <= block.end_line);
        }
        let total: usize = hidden.blocks.iter().map(|b| b.lines).sum();
        assert_eq!(total, hidden.line_blocks.len());
    }

    #[test]
    fn pinned_rows_never_absorbed() {
        let old = "a\nb\nc\nd\ne\nf\ng";
        let new = "a\nb\nc\nd\ne\nf\ng";
        let (rows, diff_lines) = diff(old, new, vec![LineId::Left(4)]);
        let hidden = compute_hidden_blocks(&rows, &diff_lines, 0);

        // Row 3 (line 4) is pinned: the single unchanged run splits around it.
        assert!(!hidden.line_blocks.contains_key(&3));
        assert_eq!(hidden.blocks.len(), 2);
    }

    #[test]
    fn no_changes_yields_one_block() {
        let (rows, diff_lines) = diff("a\nb\nc", "a\nb\nc", vec![]);
        let hidden = compute_hidden_blocks(&rows, &diff_lines, 3);
        assert_eq!(hidden.blocks.len(), 1);
        assert_eq!(hidden.blocks[0].lines, 3);
    }
}
