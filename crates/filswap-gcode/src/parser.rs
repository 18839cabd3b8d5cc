//! G-Code line parsing
//!
//! Only what the layer scanner needs: the command code of a line, the numeric
//! value of a parameter word, and the slicer's `;LAYER:<n>` boundary markers.
//! Anything after `;` is a comment and never carries parameters.

/// Prefix of the slicer comment that starts every layer
pub const LAYER_MARKER: &str = ";LAYER:";

/// Command code of a line, e.g. `G1` or `M104`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code {
    pub letter: char,
    pub number: u16,
}

/// Parameter word, e.g. `X10.5`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    pub letter: char,
    pub value: f64,
}

/// A line split into its command code and numeric parameter words
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedLine {
    code: Option<Code>,
    words: Vec<Word>,
}

impl ParsedLine {
    /// Parse a single line of G-code
    ///
    /// Lines without a recognisable command code yield no words. Free text
    /// commands (`M117`) keep their code but no words, so a message such as
    /// `M117 E3 done` never looks like an extrusion.
    pub fn parse(line: &str) -> Self {
        let body = match line.find(';') {
            Some(pos) => &line[..pos],
            None => line,
        };

        let mut tokens = split_words(body).into_iter();
        let code = match tokens.next().and_then(|(letter, value)| parse_code(letter, value)) {
            Some(code) => code,
            None => return Self::default(),
        };

        if code.letter == 'M' && code.number == 117 {
            return Self {
                code: Some(code),
                words: Vec::new(),
            };
        }

        let words = tokens
            .filter_map(|(letter, value)| parse_word(letter, value))
            .collect();
        Self {
            code: Some(code),
            words,
        }
    }

    /// Command code, if the line has one
    pub fn code(&self) -> Option<Code> {
        self.code
    }

    /// Value of the first parameter word with this letter
    pub fn value(&self, letter: char) -> Option<f64> {
        let letter = letter.to_ascii_uppercase();
        self.words
            .iter()
            .find(|word| word.letter == letter)
            .map(|word| word.value)
    }

    /// `G0`..`G3` moves
    pub fn is_motion(&self) -> bool {
        matches!(self.code, Some(Code { letter: 'G', number: 0..=3 }))
    }

    /// `M104`/`M109` hotend temperature commands
    pub fn is_temperature_set(&self) -> bool {
        matches!(self.code, Some(Code { letter: 'M', number: 104 | 109 }))
    }
}

/// Split a comment-free line into `(letter, value text)` pairs
///
/// A word starts at every ASCII letter, so both `G1 X10 Y10` and the compact
/// `G1X10Y10` give the same words. Text before the first letter is dropped.
fn split_words(body: &str) -> Vec<(char, &str)> {
    let mut words = Vec::new();
    let mut current: Option<(char, usize)> = None;

    for (index, ch) in body.char_indices() {
        if ch.is_ascii_alphabetic() {
            if let Some((letter, start)) = current.take() {
                words.push((letter, body[start..index].trim()));
            }
            current = Some((ch.to_ascii_uppercase(), index + 1));
        }
    }

    if let Some((letter, start)) = current {
        words.push((letter, body[start..].trim()));
    }

    words
}

fn parse_code(letter: char, value: &str) -> Option<Code> {
    if letter != 'G' && letter != 'M' && letter != 'T' {
        return None;
    }
    let number = value.parse::<u16>().ok()?;
    Some(Code { letter, number })
}

fn parse_word(letter: char, value: &str) -> Option<Word> {
    let value = value.parse::<f64>().ok()?;
    value.is_finite().then_some(Word { letter, value })
}

/// Layer index carried by a `;LAYER:<n>` boundary marker
///
/// Returns `None` both for ordinary lines and for markers whose value is not
/// an integer; such lines are treated as plain state lines.
pub fn layer_marker(line: &str) -> Option<i64> {
    line.strip_prefix(LAYER_MARKER)?.trim().parse::<i64>().ok()
}
