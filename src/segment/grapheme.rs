use unicode_general_category::{GeneralCategory, get_general_category};

use crate::alignment::TimedChar;

/// A base character plus the combining marks that follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphemeCluster {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl GraphemeCluster {
    /// The character that classifies the cluster.
    pub fn base(&self) -> Option<char> {
        self.text.chars().next()
    }
}

/// True for the Mn, Mc and Me general categories.
pub fn is_combining_mark(ch: char) -> bool {
    matches!(
        get_general_category(ch),
        GeneralCategory::NonspacingMark | GeneralCategory::SpacingMark | GeneralCategory::EnclosingMark
    )
}

/// Folds every combining mark into the cluster of the nearest preceding
/// non-mark character. The cluster starts with its base and ends with its last
/// mark.
///
/// A mark at the very beginning has no base and starts its own cluster.
pub fn cluster(chars: &[TimedChar]) -> Vec<GraphemeCluster> {
    let mut clusters: Vec<GraphemeCluster> = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let base = chars[i];
        let mut current = GraphemeCluster {
            text: base.ch.to_string(),
            start: base.start,
            end: base.end,
        };

        let mut j = i + 1;
        while j < chars.len() && is_combining_mark(chars[j].ch) {
            current.text.push(chars[j].ch);
            current.end = chars[j].end;
            j += 1;
        }

        clusters.push(current);
        i = j;
    }

    clusters
}
