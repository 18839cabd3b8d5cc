//! Sliced G-code document
//!
//! A document is the ordered list of layer blocks a slicer produces. Blocks
//! are kept as raw text; joining them back gives the original file.

use crate::parser::LAYER_MARKER;

/// Ordered layer blocks of a sliced print
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    layers: Vec<String>,
}

impl Document {
    /// Wrap blocks that were already split by the host
    pub fn new(layers: Vec<String>) -> Self {
        Self { layers }
    }

    /// Split a flat G-code file into blocks
    ///
    /// Everything before the first `;LAYER:` line forms a preamble block; each
    /// `;LAYER:` line then starts a new block. Line endings are preserved.
    pub fn from_gcode(text: &str) -> Self {
        let mut layers = Vec::new();
        let mut current = String::new();

        for line in text.split_inclusive('\n') {
            if line.starts_with(LAYER_MARKER) && !current.is_empty() {
                layers.push(std::mem::take(&mut current));
            }
            current.push_str(line);
        }

        if !current.is_empty() {
            layers.push(current);
        }

        Self { layers }
    }

    /// Join all blocks back into one file
    pub fn to_gcode(&self) -> String {
        self.layers.concat()
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Put `text` in front of the block at `index`
    ///
    /// Returns false, leaving the document untouched, if there is no such block.
    pub fn prepend(&mut self, index: usize, text: &str) -> bool {
        match self.layers.get_mut(index) {
            Some(block) => {
                block.insert_str(0, text);
                true
            }
            None => false,
        }
    }

    pub fn into_layers(self) -> Vec<String> {
        self.layers
    }
}

impl From<Vec<String>> for Document {
    fn from(layers: Vec<String>) -> Self {
        Self::new(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLICED: &str = ";FLAVOR:Marlin\nM104 S200\n;LAYER:0\nG1 X1 Y1 E1\n;LAYER:1\nG1 X2 Y2 E2\n";

    #[test]
    fn test_split_at_layer_markers() {
        let doc = Document::from_gcode(SLICED);
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.layers()[0], ";FLAVOR:Marlin\nM104 S200\n");
        assert_eq!(doc.layers()[1], ";LAYER:0\nG1 X1 Y1 E1\n");
        assert_eq!(doc.layers()[2], ";LAYER:1\nG1 X2 Y2 E2\n");
    }

    #[test]
    fn test_join_reproduces_input() {
        let doc = Document::from_gcode(SLICED);
        assert_eq!(doc.to_gcode(), SLICED);

        let no_newline = "G28\n;LAYER:0\nG1 X1";
        assert_eq!(Document::from_gcode(no_newline).to_gcode(), no_newline);
    }

    #[test]
    fn test_no_preamble() {
        let doc = Document::from_gcode(";LAYER:0\nG1 X1\n");
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let doc = Document::from_gcode("");
        assert!(doc.is_empty());
        assert_eq!(doc.to_gcode(), "");
    }

    #[test]
    fn test_prepend() {
        let mut doc = Document::new(vec!["a\n".to_string(), "b\n".to_string()]);
        assert!(doc.prepend(1, "x\n"));
        assert_eq!(doc.layers()[1], "x\nb\n");
        assert!(!doc.prepend(5, "y\n"));
        assert_eq!(doc.into_layers(), vec!["a\n".to_string(), "x\nb\n".to_string()]);
    }
}
