use bingo_shared::{Card, Coord, MAX_SCORE};
use std::collections::BTreeSet;

/// Counts the rows whose every non-empty cell is selected, capped at
/// [`MAX_SCORE`]. Selections on empty cells or outside the grid never count.
pub fn score(card: &Card, selected: &BTreeSet<Coord>) -> u8 {
    let complete = card
        .content
        .iter()
        .enumerate()
        .filter(|(y, row)| {
            let mut numbers = row
                .iter()
                .enumerate()
                .filter(|(_, cell)| cell.is_some())
                .peekable();
            numbers.peek().is_some()
                && numbers.all(|(x, _)| selected.contains(&Coord::new(x as u8, *y as u8)))
        })
        .count();

    (complete as u8).min(MAX_SCORE)
}
