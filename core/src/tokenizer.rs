use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref PUNCT: Regex = Regex::new(r"[[:punct:]\p{P}]").expect("valid regex");
}

/// Normalize text with NFKC folding, lowercasing and punctuation removal.
///
/// Indexing and querying must both go through this function, otherwise
/// query terms will not line up with indexed terms.
pub fn normalize(text: &str) -> String {
    let folded = text.nfkc().collect::<String>().to_lowercase();
    PUNCT.replace_all(&folded, "").trim().to_string()
}

/// Normalize text and split it on whitespace. Never yields empty tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text).split_whitespace().map(str::to_string).collect()
}
