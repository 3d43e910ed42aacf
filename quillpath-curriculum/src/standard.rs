//! Built-in writing curriculum.

use crate::graph::Level;
use quillpath_types::Category;

pub(crate) const ENTRY_LEVEL: &str = "mechanics-1";

pub(crate) fn levels() -> Vec<Level> {
    vec![
        Level::new("mechanics-1", Category::Mechanics, 1, 1)
            .titled("Sentence Boundaries", "complete sentences, fragments and run-ons"),
        Level::new("mechanics-2", Category::Mechanics, 2, 2)
            .titled("Punctuation in Motion", "commas, semicolons and dashes")
            .requires("mechanics-1"),
        Level::new("mechanics-3", Category::Mechanics, 3, 3)
            .titled("Precise Word Choice", "concrete nouns and strong verbs")
            .requires("mechanics-2"),
        Level::new("sequencing-1", Category::Sequencing, 2, 1)
            .titled("Ordering Events", "chronological order and transitions")
            .requires("mechanics-3"),
        Level::new("sequencing-2", Category::Sequencing, 3, 2)
            .titled("Building Paragraphs", "topic sentences and supporting detail")
            .requires("sequencing-1"),
        Level::new("sequencing-3", Category::Sequencing, 4, 3)
            .titled("Arguments in Order", "claim, evidence and reasoning")
            .requires("sequencing-2"),
        Level::new("voice-1", Category::Voice, 3, 1)
            .titled("Finding Your Tone", "formal and informal registers")
            .requires("sequencing-3"),
        Level::new("voice-2", Category::Voice, 4, 2)
            .titled("Rhythm and Variety", "sentence length and cadence")
            .requires("voice-1"),
        Level::new("voice-3", Category::Voice, 5, 3)
            .titled("Style Imitation", "borrowing the moves of published writers")
            .requires("voice-2"),
    ]
}
