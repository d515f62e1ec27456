//! # Ranges
//!
//! A range is a pair of positions with `start <= end`. Most ranges built by
//! operations are *flat*: both ends share the same parent. Transformation
//! helpers below keep flat ranges flat, splitting them into several pieces
//! when content lands in the middle.

use crate::position::{Position, PositionRelation};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Creates a range; the positions are swapped if given in reverse order.
    pub fn new(start: Position, end: Position) -> Self {
        if start.is_after(&end) {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn collapsed(position: Position) -> Self {
        Self {
            start: position.clone(),
            end: position,
        }
    }

    /// Flat range covering `how_many` offsets starting at `start`.
    pub fn from_position_and_shift(start: &Position, how_many: usize) -> Self {
        let end = start.get_shifted_by(how_many as isize);
        Self {
            start: start.clone(),
            end,
        }
    }

    pub fn root(&self) -> &str {
        &self.start.root
    }

    pub fn is_collapsed(&self) -> bool {
        self.start.is_equal(&self.end)
    }

    /// Whether both ends share the same parent.
    pub fn is_flat(&self) -> bool {
        self.start.has_same_parent_as(&self.end)
    }

    /// Offset span of a flat range.
    pub fn how_many(&self) -> usize {
        self.end.offset().saturating_sub(self.start.offset())
    }

    /// Whether `position` is strictly between the range ends.
    pub fn contains_position(&self, position: &Position) -> bool {
        position.is_after(&self.start) && position.is_before(&self.end)
    }

    /// Whether `other` lies inside this range. With `loose`, shared boundaries count.
    pub fn contains_range(&self, other: &Range, loose: bool) -> bool {
        let loose = loose && !other.is_collapsed();

        let contains_start = self.contains_position(&other.start)
            || (loose && self.start.is_equal(&other.start));
        let contains_end =
            self.contains_position(&other.end) || (loose && self.end.is_equal(&other.end));

        contains_start && contains_end
    }

    pub fn is_intersecting(&self, other: &Range) -> bool {
        self.start.is_before(&other.end) && self.end.is_after(&other.start)
    }

    /// Parts of this range not covered by `other`. Zero, one or two ranges.
    pub fn get_difference(&self, other: &Range) -> Vec<Range> {
        if !self.is_intersecting(other) {
            return vec![self.clone()];
        }

        let mut ranges = Vec::new();

        if self.contains_position(&other.start) {
            ranges.push(Range::new(self.start.clone(), other.start.clone()));
        }

        if self.contains_position(&other.end) {
            ranges.push(Range::new(other.end.clone(), self.end.clone()));
        }

        ranges
    }

    pub fn get_intersection(&self, other: &Range) -> Option<Range> {
        if !self.is_intersecting(other) {
            return None;
        }

        let start = if self.contains_position(&other.start) {
            other.start.clone()
        } else {
            self.start.clone()
        };

        let end = if self.contains_position(&other.end) {
            other.end.clone()
        } else {
            self.end.clone()
        };

        Some(Range::new(start, end))
    }

    /// Transforms this range by an insertion of `how_many` offsets at `insert_position`.
    ///
    /// With `spread`, a flat range that contains the insertion point is split in
    /// two so the inserted content is not covered. Otherwise `sticky` decides
    /// whether content inserted at the range boundaries extends the range.
    pub fn get_transformed_by_insertion(
        &self,
        insert_position: &Position,
        how_many: usize,
        spread: bool,
        sticky: bool,
    ) -> Vec<Range> {
        if spread
            && insert_position.has_same_parent_as(&self.start)
            && self.is_flat()
            && self.contains_position(insert_position)
        {
            return vec![
                Range::new(self.start.clone(), insert_position.clone()),
                Range::new(
                    insert_position.get_shifted_by(how_many as isize),
                    self.end
                        .get_transformed_by_insertion(insert_position, how_many, true),
                ),
            ];
        }

        let collapsed = self.is_collapsed();
        let insert_before_start = collapsed || !sticky;
        let insert_before_end = collapsed || sticky;

        vec![Range {
            start: self.start.get_transformed_by_insertion(
                insert_position,
                how_many,
                insert_before_start,
            ),
            end: self
                .end
                .get_transformed_by_insertion(insert_position, how_many, insert_before_end),
        }]
    }

    /// Transforms this range by a move of `how_many` offsets from `source` to `target`.
    ///
    /// Content of the range that was moved is returned as a separate range at its
    /// new place. A flat range whose parent differs from the moved range's parent
    /// is treated as a whole: it either travels with the moved nodes or is shifted.
    pub fn get_transformed_by_move(
        &self,
        source: &Position,
        target: &Position,
        how_many: usize,
        spread: bool,
    ) -> Vec<Range> {
        if self.is_collapsed() {
            let position = self
                .start
                .get_transformed_by_move(source, target, how_many, true, false);
            return vec![Range::collapsed(position)];
        }

        let insert_position = target
            .get_transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| target.clone());

        if !source.has_same_parent_as(&self.start) || !self.is_flat() {
            let start = self.start.get_transformed_by_deletion(source, how_many);
            let end = self.end.get_transformed_by_deletion(source, how_many);

            return match (start, end) {
                (Some(start), Some(end)) => Range { start, end }.get_transformed_by_insertion(
                    &insert_position,
                    how_many,
                    spread,
                    false,
                ),
                _ => vec![Range {
                    start: self.start.get_combined(source, &insert_position),
                    end: self.end.get_combined(source, &insert_position),
                }],
            };
        }

        let moved = Range::from_position_and_shift(source, how_many);
        let difference_set = self.get_difference(&moved);
        let common = self.get_intersection(&moved);

        let difference = match difference_set.len() {
            1 => {
                let piece = &difference_set[0];
                Some(Range {
                    start: piece
                        .start
                        .get_transformed_by_deletion(source, how_many)
                        .unwrap_or_else(|| piece.start.clone()),
                    end: piece
                        .end
                        .get_transformed_by_deletion(source, how_many)
                        .unwrap_or_else(|| piece.end.clone()),
                })
            }
            2 => Some(Range {
                start: self.start.clone(),
                end: self
                    .end
                    .get_transformed_by_deletion(source, how_many)
                    .unwrap_or_else(|| self.end.clone()),
            }),
            _ => None,
        };

        let mut result = match difference {
            Some(difference) => difference.get_transformed_by_insertion(
                &insert_position,
                how_many,
                spread || common.is_some(),
                false,
            ),
            None => Vec::new(),
        };

        if let Some(common) = common {
            result.push(Range {
                start: common.start.get_combined(source, &insert_position),
                end: common.end.get_combined(source, &insert_position),
            });
        }

        result
    }

    pub fn compare_start(&self, other: &Range) -> PositionRelation {
        self.start.compare_with(&other.start)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn range(start: &[usize], end: &[usize]) -> Range {
        Range::new(pos(start), pos(end))
    }

    #[test]
    fn test_new_orders_positions() {
        let r = Range::new(pos(&[4]), pos(&[1]));
        assert_eq!(r.start, pos(&[1]));
        assert_eq!(r.end, pos(&[4]));
    }

    #[test]
    fn test_containment() {
        let r = range(&[1], &[5]);
        assert!(r.contains_position(&pos(&[3])));
        assert!(!r.contains_position(&pos(&[1])));
        assert!(r.contains_range(&range(&[2], &[3]), false));
        assert!(!r.contains_range(&range(&[1], &[3]), false));
        assert!(r.contains_range(&range(&[1], &[3]), true));
    }

    #[test]
    fn test_difference_and_intersection() {
        let r = range(&[1], &[6]);
        let other = range(&[2], &[4]);

        assert_eq!(
            r.get_difference(&other),
            vec![range(&[1], &[2]), range(&[4], &[6])]
        );
        assert_eq!(r.get_intersection(&other), Some(range(&[2], &[4])));

        assert_eq!(r.get_difference(&range(&[0], &[8])), Vec::<Range>::new());
        assert_eq!(r.get_intersection(&range(&[7], &[8])), None);
    }

    #[test]
    fn test_insertion_spreads_flat_range() {
        let pieces = range(&[1], &[5]).get_transformed_by_insertion(&pos(&[3]), 2, true, false);
        assert_eq!(pieces, vec![range(&[1], &[3]), range(&[5], &[7])]);
    }

    #[test]
    fn test_insertion_at_boundaries() {
        let r = range(&[1], &[5]);

        let plain = r.get_transformed_by_insertion(&pos(&[5]), 2, false, false);
        assert_eq!(plain, vec![range(&[1], &[5])]);

        let sticky = r.get_transformed_by_insertion(&pos(&[5]), 2, false, true);
        assert_eq!(sticky, vec![range(&[1], &[7])]);
    }

    #[test]
    fn test_move_out_of_range() {
        // Offsets 2..4 are moved to the end of the parent.
        let pieces = range(&[0], &[5]).get_transformed_by_move(&pos(&[2]), &pos(&[10]), 2, false);
        assert_eq!(pieces, vec![range(&[0], &[3]), range(&[8], &[10])]);
    }

    #[test]
    fn test_move_of_ancestor_carries_range() {
        let r = range(&[1, 0], &[1, 3]);
        let pieces = r.get_transformed_by_move(&pos(&[1]), &Position::new("$graveyard", vec![0]), 1, true);
        assert_eq!(
            pieces,
            vec![Range::new(
                Position::new("$graveyard", vec![0, 0]),
                Position::new("$graveyard", vec![0, 3])
            )]
        );
    }

    #[test]
    fn test_move_inside_child_keeps_flat_range() {
        let r = range(&[0], &[3]);
        let pieces = r.get_transformed_by_move(&pos(&[1, 0]), &pos(&[2, 0]), 1, true);
        assert_eq!(pieces, vec![range(&[0], &[3])]);
    }
}
