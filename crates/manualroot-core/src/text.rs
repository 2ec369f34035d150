//! Text normalization shared by extraction, matching and search

/// Replace Latin accented letters with their ASCII base letter
pub fn fold_accents(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

/// Lowercase, fold accents, turn punctuation into spaces and collapse whitespace
pub fn normalize(s: &str) -> String {
    let folded: String = fold_accents(s)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`normalize`] with all whitespace removed: "OVF-10" and "ovf 10" both become "ovf10"
pub fn compact(s: &str) -> String {
    normalize(s).replace(' ', "")
}

/// Normalized whitespace tokens
pub fn tokens(s: &str) -> Vec<String> {
    normalize(s).split_whitespace().map(str::to_string).collect()
}

/// Strip the punctuation the enricher ignores around a word
pub fn strip_word_punctuation(word: &str) -> String {
    word.chars()
        .filter(|c| !matches!(c, '(' | ')' | '.' | ',' | ';' | ':' | '!' | '?' | '-' | '/'))
        .collect()
}

/// Jaccard similarity of the normalized token sets
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;
    let ta: HashSet<String> = tokens(a).into_iter().collect();
    let tb: HashSet<String> = tokens(b).into_iter().collect();
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let inter = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    inter / union
}
