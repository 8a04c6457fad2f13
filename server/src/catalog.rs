//! Static card catalog loaded once at startup.
//!
//! Cards are stored in a compact text form, one card per line: 27
//! comma-separated cells in column-major order (`cells[x * CARD_HEIGHT + y]`),
//! with `_` marking an empty cell.

use bingo_shared::{Card, CardId, Row, CARD_HEIGHT, CARD_WIDTH, MAX_NUMBER};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

const CARDS_PER_VIDEO: usize = 1;

const VIDEOS: [&str; 24] = [
    "/videos/Abstract - 1372.mp4",
    "/videos/Art - 26312.mp4",
    "/videos/Art - 27075.mp4",
    "/videos/Corridor - 68457.mp4",
    "/videos/Energy Field - 74933.mp4",
    "/videos/Future - 26045.mp4",
    "/videos/Futuristic - 27248.mp4",
    "/videos/Golden - 38432.mp4",
    "/videos/Grid - 82515.mp4",
    "/videos/Holy - 26847.mp4",
    "/videos/Neon - 34999.mp4",
    "/videos/Neon - 36027.mp4",
    "/videos/Neon - 56368.mp4",
    "/videos/Reflection - 48516.mp4",
    "/videos/Science Fiction - 53725.mp4",
    "/videos/Scifi - 26038.mp4",
    "/videos/Sci-Fi - 26542.mp4",
    "/videos/Scifi - 26743.mp4",
    "/videos/Space - 35008.mp4",
    "/videos/Space Ship - 53601.mp4",
    "/videos/Star - 38429.mp4",
    "/videos/Tunnel - 34168.mp4",
    "/videos/Tunnel - 65493.mp4",
    "/videos/Tunnel - 79764.mp4",
];

const BUILTIN_CARDS: &str = "\
1,_,2,_,10,_,20,_,23,_,30,_,40,_,46,_,56,_,64,_,68,76,79,_,_,82,87
1,_,3,_,11,_,25,_,26,_,31,_,40,_,42,_,59,_,61,_,64,75,78,_,_,85,88
2,_,5,_,12,_,20,_,23,_,32,_,43,_,49,_,53,_,60,_,69,74,79,_,_,80,84
3,_,6,_,13,_,22,_,27,_,31,_,42,_,47,_,52,_,65,_,61,72,79,_,_,83,90
5,_,7,_,14,_,26,_,29,_,34,_,43,_,45,_,59,_,63,_,68,73,77,_,_,85,86
4,_,8,_,11,_,25,_,28,_,33,_,41,_,47,_,51,_,62,_,67,75,77,_,_,82,89
3,_,8,_,16,_,27,_,28,_,36,_,47,_,48,_,57,_,66,_,68,77,78,_,_,87,88
1,_,6,_,17,_,21,_,25,_,38,_,42,_,44,_,55,_,66,_,67,70,75,_,_,81,83
7,_,9,12,19,_,_,24,26,34,_,35,_,44,_,54,_,59,_,66,_,70,_,73,_,84,_
2,_,8,13,18,_,_,22,27,38,_,41,_,47,_,52,_,58,_,67,_,74,_,79,_,89,_
6,_,8,11,15,_,_,27,28,35,_,37,_,44,_,50,_,59,_,63,_,72,_,77,_,82,_
2,_,8,10,15,_,_,21,26,36,_,39,_,40,_,50,_,56,_,60,_,71,_,74,_,83,_
3,_,6,_,18,_,22,_,29,_,38,_,45,_,48,_,51,_,60,_,66,72,79,_,_,81,86
7,_,9,_,16,_,23,_,24,_,37,_,44,_,46,_,54,_,61,_,67,73,79,_,_,83,90
5,_,9,_,10,_,21,_,24,_,30,_,40,_,41,_,51,_,65,_,68,71,77,_,_,82,89
4,_,9,14,17,_,_,25,29,32,_,38,_,42,_,55,_,58,_,64,_,71,_,76,_,86,_
1,_,4,_,17,_,21,_,28,_,39,_,45,_,48,_,50,_,62,_,65,70,73,_,_,81,90
3,_,9,12,16,_,_,21,24,30,_,35,_,41,_,53,_,57,_,61,_,70,_,73,_,87,_
2,_,8,13,19,_,_,22,27,36,_,38,_,47,_,52,_,58,_,67,_,74,_,79,_,89,_
1,_,7,11,18,_,_,20,28,31,_,39,_,43,_,51,_,55,_,63,_,75,_,78,_,88,_
1,_,4,_,14,_,24,_,29,_,33,_,43,_,45,_,54,_,62,_,69,70,75,_,_,81,85
6,_,8,13,18,_,_,22,29,33,_,37,_,41,_,52,_,57,_,65,_,72,_,76,_,85,_
5,_,7,_,15,_,22,_,26,_,34,_,46,_,48,_,56,_,62,_,63,72,76,_,_,86,89
2,_,5,_,18,_,23,_,25,_,32,_,45,_,49,_,58,_,64,_,69,71,78,_,_,80,86
";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("line {line}: expected {expected} cells, found {found}")]
    CellCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: invalid cell {cell:?}")]
    InvalidCell { line: usize, cell: String },
    #[error("line {line}: number {number} is outside 1-{max}", max = MAX_NUMBER)]
    OutOfRange { line: usize, number: u32 },
    #[error("line {line}: number {number} appears twice on the same card")]
    Duplicate { line: usize, number: u8 },
    #[error("catalog contains no cards")]
    Empty,
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
}

/// The fixed set of playable cards. Read-only after load.
#[derive(Debug, Clone)]
pub struct Catalog {
    cards: Vec<Card>,
}

impl Catalog {
    /// The 24 cards shipped with the server.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::parse(BUILTIN_CARDS)
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parses one card per line. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let mut cards = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let id = cards.len() as CardId;
            cards.push(parse_card(id, line, index + 1)?);
        }

        if cards.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { cards })
    }

    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.cards.get(id as usize)
    }

    pub fn ids(&self) -> impl Iterator<Item = CardId> + '_ {
        (0..self.cards.len()).map(|id| id as CardId)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

fn parse_card(id: CardId, line: &str, line_no: usize) -> Result<Card, CatalogError> {
    let cells: Vec<&str> = line.split(',').map(str::trim).collect();
    let expected = CARD_WIDTH * CARD_HEIGHT;
    if cells.len() != expected {
        return Err(CatalogError::CellCount {
            line: line_no,
            expected,
            found: cells.len(),
        });
    }

    let mut values = Vec::with_capacity(expected);
    let mut seen = HashSet::new();
    for cell in &cells {
        let value = parse_cell(cell, line_no)?;
        if let Some(number) = value {
            if !seen.insert(number) {
                return Err(CatalogError::Duplicate {
                    line: line_no,
                    number,
                });
            }
        }
        values.push(value);
    }

    let mut content: [Row; CARD_HEIGHT] = [[None; CARD_WIDTH]; CARD_HEIGHT];
    for (x, column) in values.chunks(CARD_HEIGHT).enumerate() {
        for (y, value) in column.iter().enumerate() {
            content[y][x] = *value;
        }
    }

    Ok(Card {
        id,
        card_no: id + 1,
        video: VIDEOS[(id as usize / CARDS_PER_VIDEO) % VIDEOS.len()].to_string(),
        content,
        numbers: values.into_iter().flatten().collect(),
    })
}

fn parse_cell(cell: &str, line_no: usize) -> Result<Option<u8>, CatalogError> {
    if cell == "_" {
        return Ok(None);
    }
    let number: u32 = cell.parse().map_err(|_| CatalogError::InvalidCell {
        line: line_no,
        cell: cell.to_string(),
    })?;
    if number == 0 || number > MAX_NUMBER as u32 {
        return Err(CatalogError::OutOfRange {
            line: line_no,
            number,
        });
    }
    Ok(Some(number as u8))
}
