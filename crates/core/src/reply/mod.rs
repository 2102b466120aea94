mod filter;
mod format;

use crate::config::TargetLang;
use serde::{Deserialize, Serialize};

pub use filter::{echo_key, filter};
pub use format::ReplyFormatter;

/// Sent when every translation was filtered away.
pub const NOTHING_TO_TRANSLATE: &str = "Nothing to translate.";
/// Sent when every backend failed.
pub const TRANSLATION_UNAVAILABLE: &str =
    "Sorry, translation is not available right now. Please try again later.";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyLine {
    pub lang: TargetLang,
    pub text: String,
}

/// The translations worth showing, in target-language order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilteredReply(Vec<ReplyLine>);

impl FilteredReply {
    pub fn lines(&self) -> &[ReplyLine] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<ReplyLine> for FilteredReply {
    fn from_iter<I: IntoIterator<Item = ReplyLine>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
