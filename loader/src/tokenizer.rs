use clap::ValueEnum;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STOP_EN: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
    static ref STOP_FR: HashSet<&'static str> = {
        let words: &[&str] = &[
            "au","aux","avec","ce","ces","cette","dans","de","des","du","elle","elles","en","et","eux",
            "il","ils","je","la","le","les","leur","leurs","lui","ma","mais","me","mes","moi","mon",
            "ne","ni","nos","notre","nous","on","ou","où","par","pas","plus","pour","qu","que","qui",
            "sa","se","ses","si","son","sur","ta","te","tes","toi","ton","tu","un","une","vos","votre",
            "vous","y","a","ai","aie","as","avait","avez","avons","c'est","d'un","d'une","eu","est",
            "sont","suis","être","était","été","étés","j'ai","l'on","n'est","qu'il","qu'elle","s'est"
        ];
        words.iter().copied().collect()
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Language {
    English,
    French,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::English => f.write_str("english"),
            Language::French => f.write_str("french"),
        }
    }
}

/// Everything derived from one pass over a book's raw text.
pub struct TextAnalysis {
    /// Distinct stems with occurrence counts, in first-appearance order.
    pub glossary: IndexMap<String, u64>,
    /// Raw word count, stopwords included.
    pub words: u64,
    pub sentences: u64,
}

pub struct Tokenizer {
    stemmer: Stemmer,
    stopwords: &'static HashSet<&'static str>,
}

impl Tokenizer {
    pub fn new(language: Language) -> Self {
        match language {
            Language::English => {
                Self { stemmer: Stemmer::create(Algorithm::English), stopwords: &STOP_EN }
            }
            Language::French => {
                Self { stemmer: Stemmer::create(Algorithm::French), stopwords: &STOP_FR }
            }
        }
    }

    /// NFKC normalization, lowercase, Unicode-word extraction, stopword
    /// removal, then stemming into glossary counts.
    pub fn analyze(&self, text: &str) -> TextAnalysis {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut glossary: IndexMap<String, u64> = IndexMap::new();
        let mut words = 0u64;
        for mat in RE.find_iter(&normalized) {
            words += 1;
            let token = mat.as_str();
            if self.stopwords.contains(token) { continue; }
            *glossary.entry(self.stemmer.stem(token).to_string()).or_insert(0) += 1;
        }
        TextAnalysis { glossary, words, sentences: sentence_count(&normalized) }
    }
}

/// Sentences end at '.', '!' or '?'; empty segments (ellipses, trailing
/// punctuation) do not count.
pub fn sentence_count(text: &str) -> u64 {
    text.split(['.', '!', '?']).filter(|s| !s.trim().is_empty()).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_collapse_inflections() {
        let t = Tokenizer::new(Language::English);
        let analysis = t.analyze("Running, runner's run!");
        assert!(analysis.glossary.contains_key("run"));
    }

    #[test]
    fn stopwords_never_reach_the_glossary() {
        let t = Tokenizer::new(Language::English);
        let analysis = t.analyze("the whale and the sea");
        assert_eq!(analysis.words, 5);
        assert!(!analysis.glossary.contains_key("the"));
        assert!(analysis.glossary.contains_key("whale"));
        assert!(analysis.glossary.contains_key("sea"));
    }

    #[test]
    fn glossary_keeps_first_appearance_order_and_counts() {
        let t = Tokenizer::new(Language::English);
        let analysis = t.analyze("harbor storm harbor anchor harbor");
        let entries: Vec<(&str, u64)> =
            analysis.glossary.iter().map(|(w, c)| (w.as_str(), *c)).collect();
        assert_eq!(entries, vec![("harbor", 3), ("storm", 1), ("anchor", 1)]);
    }

    #[test]
    fn french_stemming_uses_the_french_stopword_list() {
        let t = Tokenizer::new(Language::French);
        let analysis = t.analyze("les maisons anciennes de la ville");
        assert!(!analysis.glossary.contains_key("les"));
        assert!(analysis.glossary.contains_key("maison"));
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        assert_eq!(sentence_count("One. Two! Three?"), 3);
        assert_eq!(sentence_count("Wait... what?"), 2);
        assert_eq!(sentence_count(""), 0);
    }
}
