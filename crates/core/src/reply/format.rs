use crate::config::LanguageMarkers;
use crate::reply::{FilteredReply, NOTHING_TO_TRANSLATE};

#[derive(Clone, Debug, Default)]
pub struct ReplyFormatter {
    markers: LanguageMarkers,
}

impl ReplyFormatter {
    pub fn new(markers: LanguageMarkers) -> Self {
        Self { markers }
    }

    /// One `marker text` block per language, separated by a blank line.
    /// Never returns an empty string.
    pub fn format(&self, reply: &FilteredReply) -> String {
        if reply.is_empty() {
            return NOTHING_TO_TRANSLATE.to_owned();
        }
        reply
            .lines()
            .iter()
            .map(|line| format!("{} {}", self.markers.marker_for(&line.lang), line.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
